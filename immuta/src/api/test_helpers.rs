//! Test helpers for the Immuta API

#[cfg(test)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::new(url, "test-key").unwrap()
}
