use ed25519_dalek::SigningKey;

use crate::*;

fn test_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn test_identity(seed: u8, email: &str) -> Identity {
    Identity {
        public_key: public_key(&test_key(seed)),
        encryption_public_key: vec![seed; 32],
        email: email.to_string(),
        ssh_public_key: vec![1, 2, 3],
        pgp_public_key: vec![],
    }
}

fn genesis_body(seed: u8) -> Body {
    Body::Main(MainChain::Create(GenesisBlock {
        creator: test_identity(seed, "alice@acme.com"),
        team_info: TeamInfo {
            name: "acme".to_string(),
        },
    }))
}

// -----------------------------------------------------------------------
// Hashing and signatures
// -----------------------------------------------------------------------

#[test]
fn test_hash_is_sha256_of_component_hashes() {
    let signed = SignedMessage {
        public_key: vec![7; 32],
        message: "hello".to_string(),
        signature: vec![],
    };

    let mut joined = Vec::new();
    joined.extend_from_slice(&sha256(&[7; 32]));
    joined.extend_from_slice(&sha256(b"hello"));
    assert_eq!(signed.hash(), BlockHash::from(sha256(&joined)));
}

#[test]
fn test_hash_ignores_signature_bytes() {
    let a = SignedMessage {
        public_key: vec![],
        message: "5".to_string(),
        signature: vec![1],
    };
    let b = SignedMessage {
        signature: vec![2],
        ..a.clone()
    };
    assert_eq!(a.hash(), b.hash());
}

#[test]
fn test_sign_body_verifies_with_signer_key() {
    let key = test_key(1);
    let signed = sign_body(genesis_body(1), &key).unwrap();

    assert_eq!(signed.signer().unwrap(), public_key(&key));
    assert!(signed.verify_signature(&public_key(&key)));
    assert!(!signed.verify_signature(&public_key(&test_key(2))));
}

#[test]
fn test_tampered_message_fails_signature() {
    let key = test_key(1);
    let mut signed = sign_body(genesis_body(1), &key).unwrap();
    signed.message = signed.message.replace("acme", "evil");
    assert!(!signed.verify_signature(&public_key(&key)));
}

#[test]
fn test_decode_message_round_trips_body() {
    let signed = sign_body(genesis_body(3), &test_key(3)).unwrap();
    let message = signed.decode_message().unwrap();
    assert_eq!(message.header.protocol_version, ProtocolVersion::CURRENT);
    assert_eq!(message.body, genesis_body(3));
}

// -----------------------------------------------------------------------
// Wire format
// -----------------------------------------------------------------------

#[test]
fn test_unit_operations_encode_as_empty_objects() {
    let json = serde_json::to_string(&Operation::CloseInvitations {}).unwrap();
    assert_eq!(json, r#"{"close_invitations":{}}"#);

    let json = serde_json::to_string(&Operation::Leave {}).unwrap();
    assert_eq!(json, r#"{"leave":{}}"#);
}

#[test]
fn test_public_keys_encode_as_base64() {
    let key = PublicKey::from([0u8; 32]);
    let json = serde_json::to_string(&Operation::Promote(key)).unwrap();
    assert_eq!(
        json,
        r#"{"promote":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="}"#
    );
}

#[test]
fn test_read_response_uses_more_key() {
    let response: ReadBlocksResponse = serde_json::from_str(r#"{"blocks":[],"more":true}"#).unwrap();
    assert!(response.has_more);
    assert!(response.blocks.is_empty());
}

#[test]
fn test_decode_rejects_unknown_field() {
    let json = r#"{"name":"acme","color":"red"}"#;
    assert!(serde_json::from_str::<TeamInfo>(json).is_err());
}

#[test]
fn test_empty_variants_reject_unknown_fields() {
    let op: Operation = serde_json::from_str(r#"{"close_invitations":{}}"#).unwrap();
    assert_eq!(op, Operation::CloseInvitations {});

    assert!(serde_json::from_str::<Operation>(r#"{"close_invitations":{"x":1}}"#).is_err());
    assert!(serde_json::from_str::<Operation>(r#"{"leave":{"x":1}}"#).is_err());
    assert!(
        serde_json::from_str::<LoggingEndpoint>(r#"{"command_encrypted":{"x":1}}"#).is_err()
    );
    assert!(
        serde_json::from_str::<PushSubscriptionAction>(r#"{"unsubscribe":{"x":1}}"#).is_err()
    );
}

#[test]
fn test_decode_rejects_unknown_operation() {
    let json = r#"{"self_destruct":{}}"#;
    assert!(serde_json::from_str::<Operation>(json).is_err());
}

#[test]
fn test_decode_rejects_missing_field() {
    let json = r#"{"public_key":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="}"#;
    assert!(serde_json::from_str::<DirectInvitation>(json).is_err());
}

#[test]
fn test_decode_rejects_short_key() {
    let json = r#"{"promote":"AAAA"}"#;
    assert!(serde_json::from_str::<Operation>(json).is_err());
}

#[test]
fn test_ids_are_raw_bytes_in_postcard() {
    let key = PublicKey::from([9u8; 32]);
    let bytes = postcard::to_allocvec(&key).unwrap();
    assert_eq!(bytes, vec![9u8; 32]);
    let back: PublicKey = postcard::from_bytes(&bytes).unwrap();
    assert_eq!(back, key);
}

#[test]
fn test_protocol_version_parsing() {
    let version: ProtocolVersion = "1.4.2".parse().unwrap();
    assert_eq!(version.to_string(), "1.4.2");
    assert!(version.is_compatible_with(&ProtocolVersion::CURRENT));

    let major: ProtocolVersion = "2.0.0".parse().unwrap();
    assert!(!major.is_compatible_with(&ProtocolVersion::CURRENT));

    assert!("1.0".parse::<ProtocolVersion>().is_err());
    assert!("1.x.0".parse::<ProtocolVersion>().is_err());
}

// -----------------------------------------------------------------------
// Invitations
// -----------------------------------------------------------------------

#[test]
fn test_domain_restriction() {
    let restriction = Restriction::Domain("acme.com".to_string());
    assert!(restriction.allows("bob@acme.com"));
    assert!(restriction.allows("bob@ACME.com"));
    assert!(!restriction.allows("bob@acme.com.evil.org"));
    assert!(!restriction.allows("acme.com"));
}

#[test]
fn test_emails_restriction() {
    let restriction = Restriction::Emails(vec!["bob@acme.com".to_string()]);
    assert!(restriction.allows("bob@acme.com"));
    assert!(!restriction.allows("eve@acme.com"));
}

#[test]
fn test_direct_invitation_admits_only_matching_identity() {
    let bob = test_identity(2, "bob@acme.com");
    let invitation = Invitation::Direct(DirectInvitation {
        public_key: bob.public_key,
        email: bob.email.clone(),
    });

    assert!(invitation.admits(&bob.public_key, &bob));

    let other_email = Identity {
        email: "eve@acme.com".to_string(),
        ..bob.clone()
    };
    assert!(!invitation.admits(&bob.public_key, &other_email));

    let eve = test_identity(5, "bob@acme.com");
    assert!(!invitation.admits(&eve.public_key, &eve));
}

#[test]
fn test_invite_link_round_trip() {
    let invite = JoinTeamInvite {
        symmetric_key: [42u8; 32],
    };
    let link = invite.link("teamchain://");
    assert!(link.starts_with("teamchain://join_team/"));
    assert_eq!(JoinTeamInvite::parse(&link).unwrap(), invite);

    let bare = link.trim_start_matches("teamchain://join_team/");
    assert_eq!(JoinTeamInvite::parse(bare).unwrap(), invite);
}

#[test]
fn test_invite_link_rejects_garbage() {
    assert!(JoinTeamInvite::parse("teamchain://join_team/!!!").is_err());
    assert!(JoinTeamInvite::parse("teamchain://join_team/AAAA").is_err());
}

// -----------------------------------------------------------------------
// Secretbox
// -----------------------------------------------------------------------

#[test]
fn test_seal_and_open() {
    let key = [3u8; 32];
    let sealed = seal(&key, b"invite secret").unwrap();
    assert_ne!(&sealed[24..], b"invite secret");
    assert_eq!(open(&key, &sealed).unwrap(), b"invite secret");
}

#[test]
fn test_open_rejects_wrong_key_and_tampering() {
    let sealed = seal(&[3u8; 32], b"payload").unwrap();
    assert!(matches!(open(&[4u8; 32], &sealed), Err(TypesError::Open)));

    let mut tampered = sealed.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 1;
    assert!(matches!(open(&[3u8; 32], &tampered), Err(TypesError::Open)));

    assert!(matches!(open(&[3u8; 32], &sealed[..10]), Err(TypesError::Open)));
}

#[test]
fn test_nonce_key_is_deterministic() {
    let seed = [8u8; 32];
    let a = nonce_signing_key(&seed).unwrap();
    let b = nonce_signing_key(&seed).unwrap();
    assert_eq!(public_key(&a), public_key(&b));
    assert!(matches!(
        nonce_signing_key(&seed[..16]),
        Err(TypesError::KeyLength(16))
    ));
}
