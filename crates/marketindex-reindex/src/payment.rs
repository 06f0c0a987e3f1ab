//! Payment token resolution for priced actions.

use std::sync::Arc;

use marketindex_core::action::ActionSummary;
use marketindex_core::config::ReindexConfig;
use marketindex_core::error::ReindexError;
use marketindex_core::services::TokenService;
use marketindex_core::state::ReindexState;
use marketindex_core::types::PaymentToken;

/// Resolves the token an action is priced in.
///
/// The token is the one named by the action (or its transfer log), falling
/// back to the referenced auction's. The nonce falls back the same way, then
/// to `0`. The native token never hits the token service; a token the service
/// does not know is priced with the native decimals.
pub struct PaymentResolver {
    tokens: Arc<dyn TokenService>,
    native_token: String,
    native_decimals: u32,
}

impl PaymentResolver {
    pub fn new(tokens: Arc<dyn TokenService>, config: &ReindexConfig) -> Self {
        Self {
            tokens,
            native_token: config.native_token.clone(),
            native_decimals: config.native_decimals,
        }
    }

    pub fn native(&self) -> PaymentToken {
        PaymentToken::native(self.native_token.clone(), self.native_decimals)
    }

    pub async fn resolve(
        &self,
        state: &ReindexState,
        summary: &ActionSummary,
    ) -> Result<PaymentToken, ReindexError> {
        if !summary.kind().needs_payment_token() {
            return Ok(self.native());
        }

        let auction = state
            .auction_index_for(summary)
            .and_then(|index| state.auctions().get(index));
        let identifier = summary
            .payment_token
            .clone()
            .or_else(|| auction.map(|a| a.payment_token.clone()))
            .unwrap_or_else(|| self.native_token.clone());
        let nonce = summary
            .payment_nonce
            .or_else(|| auction.map(|a| a.payment_nonce))
            .unwrap_or(0);

        if identifier == self.native_token {
            return Ok(self.native());
        }

        let decimals = match self.tokens.token(&identifier).await? {
            Some(token) => token.decimals,
            None => {
                tracing::debug!(token = %identifier, "unknown payment token, using native decimals");
                self.native_decimals
            }
        };
        Ok(PaymentToken {
            identifier,
            decimals,
            nonce,
        })
    }
}
