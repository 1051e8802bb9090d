#![allow(dead_code)]

pub mod mock_otter;

use otter_connector::{Credentials, OtterClient};

pub use mock_otter::{MockOtter, MOCK_EMAIL, MOCK_PASSWORD};

pub fn test_client(mock: &MockOtter) -> OtterClient {
    OtterClient::with_client(reqwest::Client::new(), mock.base_url.clone(), 10)
}

pub fn valid_credentials() -> Credentials {
    Credentials::new(MOCK_EMAIL, MOCK_PASSWORD)
}
