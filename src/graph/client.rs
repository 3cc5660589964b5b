use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::graph::models::{GraphResponse, PairsData, RawPair, RawTransaction, TransactionsData};
use crate::graph::SwapSource;

const TRANSACTIONS_QUERY: &str = r#"
query FetchTransactByBlockNumber($minBlock: BigInt!, $pageSize: Int!) {
  transactions(
    where: { blockNumber_gte: $minBlock }
    orderBy: blockNumber
    orderDirection: asc
    first: $pageSize
  ) {
    id
    timestamp
    blockNumber
    swaps {
      id
      amountUSD
      amount0In
      amount0Out
      amount1In
      amount1Out
      pair { id }
    }
  }
}
"#;

const PAIR_QUERY: &str = r#"
query FetchPairById($pairId: ID!) {
  pairs(where: { id: $pairId }) {
    id
    name
    token0 { id symbol name }
    token1 { id symbol name }
  }
}
"#;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("query error: {0}")]
    Query(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Client for the upstream subgraph. Transient failures are retried with a
/// fixed delay up to a bounded count; exhaustion surfaces the last error to
/// the caller, which is fatal at the pipeline level.
pub struct GraphClient {
    http: reqwest::Client,
    url: String,
    page_size: usize,
    retry_delay: Duration,
    retry_max_times: usize,
}

impl GraphClient {
    pub fn new(config: &Config) -> Self {
        info!(url = %config.graph_url, "initializing graph client");
        Self {
            http: reqwest::Client::new(),
            url: config.graph_url.clone(),
            page_size: config.page_size,
            retry_delay: config.retry_delay,
            retry_max_times: config.retry_max_times,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ClientError> {
        let backoff = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.retry_max_times);

        (|| self.send_request::<T>(query, variables.clone()))
            .retry(backoff)
            .notify(|err: &ClientError, dur: Duration| {
                warn!(error = %err, "retrying graph request in {dur:?}");
            })
            .await
    }

    async fn send_request<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ClientError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: GraphResponse<T> = response.json().await?;
        if !parsed.errors.is_empty() {
            let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(ClientError::Query(messages.join("; ")));
        }
        debug!("graph request ok");
        parsed
            .data
            .ok_or_else(|| ClientError::Decode("response carried no data".to_string()))
    }
}

impl SwapSource for GraphClient {
    fn page_size(&self) -> usize {
        self.page_size
    }

    async fn fetch_transactions(
        &self,
        min_block: i64,
    ) -> Result<Vec<RawTransaction>, ClientError> {
        let variables = json!({
            "minBlock": min_block.to_string(),
            "pageSize": self.page_size,
        });
        let data: TransactionsData = self.execute(TRANSACTIONS_QUERY, variables).await?;
        Ok(data.transactions)
    }

    async fn fetch_pair(&self, id: &str) -> Result<Option<RawPair>, ClientError> {
        let variables = json!({ "pairId": id });
        let data: PairsData = self.execute(PAIR_QUERY, variables).await?;
        Ok(data.pairs.into_iter().next())
    }
}
