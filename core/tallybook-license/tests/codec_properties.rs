//! Property-based tests for the license codec.
//!
//! These tests verify integrity properties that must always hold:
//! - Any claim survives encode/decode unchanged
//! - Any single-byte change to a token is rejected
//! - Encode refuses exactly the claims decode would reject

mod common;

use common::test_codec;
use proptest::prelude::*;
use tallybook_license::{LicenseClaim, LicenseClass, LicenseError};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn class_strategy() -> impl Strategy<Value = LicenseClass> {
    prop_oneof![Just(LicenseClass::Trial), Just(LicenseClass::Commercial)]
}

fn claim_strategy() -> impl Strategy<Value = LicenseClaim> {
    (
        "\\PC{0,60}",
        "[a-z0-9.]{1,20}@[a-z0-9]{1,20}\\.[a-z]{2,4}",
        0i64..4_000_000_000,
        1i64..(10 * 365 * 24 * 3600),
        0u32..10_000,
        class_strategy(),
    )
        .prop_map(|(company, email, iat, len, max_users, class)| LicenseClaim {
            company_name: company,
            contact_email: email,
            issued_at: iat,
            expires_at: iat + len,
            max_users,
            class,
        })
}

/// Characters a flipped byte is replaced with: the base64url alphabet plus
/// the separator and a few characters outside it.
fn replacement_strategy() -> impl Strategy<Value = char> {
    prop::sample::select(
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.+/=!~"
            .chars()
            .collect::<Vec<_>>(),
    )
}

// =============================================================================
// CODEC PROPERTIES
// =============================================================================

proptest! {
    /// decode(encode(C)) == C
    #[test]
    fn roundtrip_preserves_claim(claim in claim_strategy()) {
        let codec = test_codec();
        let token = codec.encode(&claim).unwrap();
        prop_assert_eq!(codec.decode(&token).unwrap(), claim);
    }

    /// Changing any one character of a valid token makes it undecodable.
    #[test]
    fn single_byte_flip_is_rejected(
        claim in claim_strategy(),
        index in any::<prop::sample::Index>(),
        replacement in replacement_strategy(),
    ) {
        let codec = test_codec();
        let token = codec.encode(&claim).unwrap();
        let mut bytes = token.into_bytes();
        let i = index.index(bytes.len());
        prop_assume!(bytes[i] != replacement as u8);
        bytes[i] = replacement as u8;
        let tampered = String::from_utf8(bytes).unwrap();

        prop_assert!(codec.decode(&tampered).is_err());
    }

    /// Whatever encode signs, decode accepts; everything else is refused up front.
    #[test]
    fn encode_only_signs_decodable_claims(
        claim in claim_strategy(),
        shift in -(2 * 365 * 24 * 3600i64)..(2 * 365 * 24 * 3600i64),
    ) {
        let codec = test_codec();
        let claim = LicenseClaim { expires_at: claim.issued_at + shift, ..claim };
        match codec.encode(&claim) {
            Ok(token) => {
                prop_assert!(shift > 0);
                prop_assert_eq!(codec.decode(&token).unwrap(), claim);
            }
            Err(LicenseError::InvalidClaim(_)) => prop_assert!(shift <= 0),
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }
}
