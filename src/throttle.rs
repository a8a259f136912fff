//! Distributed request throttling backed by a redis counter.
//!
//! Every server process sharing the redis instance shares the quota: the
//! counter for a classification key is incremented by a single atomic script,
//! which also seeds the key's expiry on the 0 -> 1 transition. Correctness
//! rests entirely on that script being one indivisible step at the redis
//! server.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::Script;
use salvo_core::http::header::{HeaderName, HeaderValue};
use salvo_core::http::StatusCode;
use salvo_core::writing::Text;
use salvo_core::{Depot, FlowCtrl, Handler, Request, Response};

/// Increments the counter, seeds its expiry when this increment created it,
/// and answers the post-increment count plus the counter's remaining TTL.
const INCR_WITH_EXPIRY: &str = r#"
local current = redis.call('INCR', KEYS[1])
if tonumber(current) == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return {current, redis.call('TTL', KEYS[1])}
"#;

/// Maps a request to a throttle key and its limit. A limit of zero or below
/// means the request is not throttled at all.
pub type ClassifyFn = Arc<dyn Fn(&Request, &Depot) -> (String, i64) + Send + Sync>;

/// Middleware enforcing a shared request quota per classification key.
///
/// On every throttled request the response carries `X-RateLimit-Limit`,
/// `X-RateLimit-Remaining` (which may go negative) and `X-RateLimit-Reset`
/// (unix seconds). Once the count exceeds the limit the request is rejected
/// with 429 and the handler is not invoked. A redis failure rejects with 503
/// (fail-closed): admitting requests while unable to count them would defeat
/// the limiter.
///
/// ```rust,ignore
/// let limiter = RateLimitHandler::from_url(
///     "redis://127.0.0.1/",
///     3600,
///     |req: &Request, _depot: &Depot| (format!("throttle:{}", client_key(req)), 1000),
/// )
/// .await?;
/// let router = Router::new().hoop(limiter).goal(api);
/// ```
pub struct RateLimitHandler {
    conn: ConnectionManager,
    script: Script,
    interval_secs: u64,
    classify: ClassifyFn,
}

impl RateLimitHandler {
    /// Create a throttle over an existing connection manager. `interval_secs`
    /// is the length of the counting window seeded on a counter's first
    /// increment.
    pub fn new(
        conn: ConnectionManager,
        interval_secs: u64,
        classify: impl Fn(&Request, &Depot) -> (String, i64) + Send + Sync + 'static,
    ) -> Self {
        Self {
            conn,
            script: Script::new(INCR_WITH_EXPIRY),
            interval_secs,
            classify: Arc::new(classify),
        }
    }

    /// Connect to the given redis URL and create a throttle.
    pub async fn from_url(
        url: &str,
        interval_secs: u64,
        classify: impl Fn(&Request, &Depot) -> (String, i64) + Send + Sync + 'static,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, interval_secs, classify))
    }

    /// Run the atomic increment for `key`, answering the post-increment count
    /// and the counter's TTL in seconds.
    async fn hit(&self, key: &str) -> Result<(i64, i64), redis::RedisError> {
        let mut conn = self.conn.clone();
        self.script
            .key(key)
            .arg(self.interval_secs)
            .invoke_async(&mut conn)
            .await
    }
}

impl Clone for RateLimitHandler {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            script: Script::new(INCR_WITH_EXPIRY),
            interval_secs: self.interval_secs,
            classify: Arc::clone(&self.classify),
        }
    }
}

#[async_trait]
impl Handler for RateLimitHandler {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        let (key, limit) = (self.classify)(req, depot);
        if limit <= 0 {
            // Unlimited flow, let it straight through.
            return;
        }

        let (count, ttl) = match self.hit(&key).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(key = %key, error = %err, "throttling: cache failure");
                res.status_code(StatusCode::SERVICE_UNAVAILABLE);
                res.render(Text::Plain("throttling backend unavailable"));
                ctrl.skip_rest();
                return;
            }
        };

        let headers = res.headers_mut();
        headers.insert(
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(limit),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(limit - count),
        );
        headers.insert(
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(Utc::now().timestamp() + ttl),
        );

        if count > limit {
            res.status_code(StatusCode::TOO_MANY_REQUESTS);
            res.render(Text::Plain(format!(
                "request rate limit exceeded - allowed rate is {} requests every {} seconds",
                limit, self.interval_secs
            )));
            ctrl.skip_rest();
        }
    }
}

#[cfg(test)]
mod tests {
    // These tests require a running redis instance:
    //   cargo test --features redis-store -- --ignored

    use super::*;
    use salvo_core::prelude::*;
    use salvo_core::test::TestClient;

    #[handler]
    async fn ok() -> &'static str {
        "ok"
    }

    fn header_i64(res: &salvo_core::Response, name: &str) -> i64 {
        res.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap()
    }

    fn unique_key(tag: &str) -> String {
        format!(
            "throttle-test:{}:{}",
            tag,
            crate::session::generate_session_id()
        )
    }

    #[tokio::test]
    #[ignore]
    async fn quota_is_enforced_with_headers() {
        let key = unique_key("quota");
        let classify = move |_req: &Request, _depot: &Depot| (key.clone(), 10);
        let limiter = RateLimitHandler::from_url("redis://127.0.0.1/", 10, classify)
            .await
            .unwrap();
        let service = Service::new(Router::new().hoop(limiter).goal(ok));

        for i in 1..=11i64 {
            let before = Utc::now().timestamp();
            let res = TestClient::get("http://127.0.0.1/").send(&service).await;

            assert_eq!(header_i64(&res, "x-ratelimit-limit"), 10);
            assert_eq!(header_i64(&res, "x-ratelimit-remaining"), 10 - i);

            let reset = header_i64(&res, "x-ratelimit-reset");
            assert!(reset >= before + 9 && reset <= Utc::now().timestamp() + 11);

            if i <= 10 {
                assert_eq!(res.status_code.unwrap(), StatusCode::OK);
            } else {
                assert_eq!(res.status_code.unwrap(), StatusCode::TOO_MANY_REQUESTS);
            }
        }
    }

    #[tokio::test]
    #[ignore]
    async fn zero_limit_bypasses_throttling() {
        let key = unique_key("bypass");
        let classify = move |_req: &Request, _depot: &Depot| (key.clone(), 0);
        let limiter = RateLimitHandler::from_url("redis://127.0.0.1/", 10, classify)
            .await
            .unwrap();
        let service = Service::new(Router::new().hoop(limiter).goal(ok));

        for _ in 0..20 {
            let res = TestClient::get("http://127.0.0.1/").send(&service).await;
            assert_eq!(res.status_code.unwrap(), StatusCode::OK);
            assert!(res.headers().get("x-ratelimit-limit").is_none());
        }
    }
}
