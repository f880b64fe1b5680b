// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock authorization provider.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use tasktally_core::{LinkedAccount, TasktallyError};
use tasktally_webhook::AuthProvider;

/// Exchanges any code for the account `user-for-{code}` unless told to fail.
#[derive(Default)]
pub struct MockAuthProvider {
    fail: AtomicBool,
}

impl MockAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_exchanges(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn exchange_code(&self, code: &str) -> Result<LinkedAccount, TasktallyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TasktallyError::Provider {
                message: "mock provider rejected the code".into(),
                source: None,
            });
        }
        Ok(LinkedAccount {
            external_user_id: format!("user-for-{code}"),
            display_name: Some("Mock User".to_string()),
        })
    }
}
