/// Signing and verification logic for transactions, separated from type definitions
use crate::crypto::{public_key_from_identity, verify_signature, SignerCredential};
use crate::error::LedgerError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Signs the transaction digest with `credential`.
    ///
    /// Reward transactions are left unsigned. `claimed_identity` must be the
    /// credential's own public identity, which stops a caller from signing on
    /// behalf of somebody else's key.
    pub fn sign(
        &mut self,
        credential: &dyn SignerCredential,
        claimed_identity: &str,
    ) -> Result<(), LedgerError> {
        if self.is_reward() {
            return Ok(());
        }

        if credential.public_identity() != claimed_identity {
            return Err(LedgerError::Signature(
                "You cannot sign transactions for other senders".to_string(),
            ));
        }

        let signature = credential.sign(&self.compute_digest())?;
        self.signature = Some(signature);
        Ok(())
    }

    /// Checks the stored signature against `sender` read as a public key.
    ///
    /// Reward transactions always verify. A missing signature is an error; a
    /// signature or sender that cannot be parsed simply fails verification.
    pub fn verify(&self) -> Result<bool, LedgerError> {
        if self.is_reward() {
            return Ok(true);
        }

        let signature = self.signature.as_ref().ok_or_else(|| {
            LedgerError::Validation("Transaction is not signed".to_string())
        })?;

        let public_key = match public_key_from_identity(&self.sender) {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };

        Ok(verify_signature(&public_key, &self.compute_digest(), signature).is_ok())
    }
}
