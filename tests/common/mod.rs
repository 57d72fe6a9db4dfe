#![allow(dead_code, clippy::unwrap_used)]

pub mod mock {
    use async_trait::async_trait;
    use brrtclient::{RawResponse, RequestDescriptor, Requester, Result};
    use http::StatusCode;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every request and answers with scripted responses.
    ///
    /// Once the script runs out every call gets an empty `200 OK`.
    #[derive(Debug, Default)]
    pub struct MockRequester {
        sent: Mutex<Vec<RequestDescriptor>>,
        script: Mutex<VecDeque<RawResponse>>,
        delay: Option<Duration>,
    }

    impl MockRequester {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(self, status: u16, body: &str) -> Self {
            let status = StatusCode::from_u16(status).unwrap();
            self.script.lock().unwrap().push_back(
                RawResponse::new(status, body.to_string()).with_url("http://mock.local"),
            );
            self
        }

        /// Wait this long before answering
        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn sent(&self) -> Vec<RequestDescriptor> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last(&self) -> RequestDescriptor {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Requester for MockRequester {
        async fn send(&self, request: RequestDescriptor) -> Result<RawResponse> {
            self.sent.lock().unwrap().push(request);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| {
                RawResponse::new(StatusCode::OK, "").with_url("http://mock.local")
            }))
        }
    }
}
