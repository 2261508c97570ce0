//! End-to-end exercises of the token pair and aggregate rules that do not
//! need a database: mint, verify, renew-with-replay, and the signup-shaped
//! aggregate construction.

use cohortid::crypto::jwt::{Claims, Error, TokenSigner};
use cohortid::crypto::{password, random};
use cohortid::users::{REFRESH_TOKEN_SLOTS, REFRESH_TOKEN_TTL, User};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use std::sync::OnceLock;

const NOW: i64 = 1_700_000_000;

fn signer() -> &'static TokenSigner {
    static SIGNER: OnceLock<TokenSigner> = OnceLock::new();
    SIGNER.get_or_init(|| {
        let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key");
        TokenSigner::from_private_key(key)
    })
}

fn signup_user(email: &str) -> User {
    let hash = password::hash_password("P@ssw0rd-1").expect("hash");
    User::new_email_user(email, &hash, "en", true, 3, NOW)
}

fn claims_for(user: &User, ttl_seconds: i64) -> Claims {
    let (main_profile_id, other_profile_ids) = user.main_and_other_profile_ids();
    Claims::new(
        &user.id.to_string(),
        "inst1",
        &main_profile_id,
        other_profile_ids,
        user.account.account_confirmed_at > 0,
        &user.roles,
        &user.account.account_id,
        None,
        NOW,
        ttl_seconds,
    )
}

#[test]
fn signup_shape_matches_expectations() {
    let user = signup_user("alice@example.org");

    assert_eq!(user.profiles.len(), 1);
    assert_eq!(user.profiles[0].alias, "alice");
    assert!(user.profiles[0].main_profile);
    assert_eq!(user.roles, vec!["PARTICIPANT".to_string()]);
    assert_eq!(user.account.account_confirmed_at, 0);
    assert!(password::compare_with_hash(
        &user.account.password_hash,
        "P@ssw0rd-1"
    ));
    assert!(!password::compare_with_hash(
        &user.account.password_hash,
        "wrong-password"
    ));
}

#[test]
fn access_token_round_trip_carries_identity() {
    let user = signup_user("alice@example.org");
    let claims = claims_for(&user, 3600);
    let token = signer().sign(&claims).expect("sign");

    let verified = signer().verify(&token, NOW + 60).expect("verify");
    assert_eq!(verified.sub, user.id.to_string());
    assert_eq!(verified.instance_id, "inst1");
    assert_eq!(verified.roles(), vec!["PARTICIPANT".to_string()]);
    assert_eq!(verified.username(), "alice@example.org");
    assert!(!verified.account_confirmed);
}

#[test]
fn renewal_accepts_expired_token_and_detects_replay() {
    let mut user = signup_user("alice@example.org");
    let refresh = random::unique_token().expect("refresh");
    user.add_refresh_token(&refresh, NOW + REFRESH_TOKEN_TTL);

    // The access token has expired by the time the client renews.
    let claims = claims_for(&user, 60);
    let access = signer().sign(&claims).expect("sign");
    let later = NOW + 120;
    assert!(matches!(signer().verify(&access, later), Err(Error::Expired)));

    // First renewal succeeds and rotates the refresh token.
    let parsed = signer().verify_allow_expired(&access).expect("parse");
    assert_eq!(parsed.sub, user.id.to_string());
    user.remove_refresh_token(&refresh, later).expect("first use");
    let rotated = random::unique_token().expect("rotated");
    user.add_refresh_token(&rotated, later + REFRESH_TOKEN_TTL);

    // Replaying the consumed refresh token fails.
    assert!(user.remove_refresh_token(&refresh, later).is_err());

    // The rotated token is present and the old one gone.
    let tokens: Vec<_> = user
        .account
        .refresh_tokens
        .iter()
        .map(|entry| entry.token.as_str())
        .collect();
    assert!(tokens.contains(&rotated.as_str()));
    assert!(!tokens.contains(&refresh.as_str()));
}

#[test]
fn device_slots_hold_the_newest_ten() {
    let mut user = signup_user("alice@example.org");
    let tokens: Vec<String> = (0..15)
        .map(|_| random::unique_token().expect("token"))
        .collect();
    for token in &tokens {
        user.add_refresh_token(token, NOW + REFRESH_TOKEN_TTL);
    }

    assert_eq!(user.account.refresh_tokens.len(), REFRESH_TOKEN_SLOTS);
    // Only the newest ten survive, oldest first.
    let kept: Vec<_> = user
        .account
        .refresh_tokens
        .iter()
        .map(|entry| entry.token.clone())
        .collect();
    assert_eq!(kept, tokens[5..].to_vec());
}

#[test]
fn confirming_the_login_contact_flips_the_claim() {
    let mut user = signup_user("alice@example.org");
    let contact_id = user.contact_infos[0].id;
    user.confirm_contact_info(contact_id, NOW + 10).expect("confirm");

    let claims = claims_for(&user, 3600);
    let token = signer().sign(&claims).expect("sign");
    let verified = signer().verify(&token, NOW + 60).expect("verify");
    assert!(verified.account_confirmed);
}
