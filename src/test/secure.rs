use crate::net::{Addr, Kind};
use crate::proto::secure::{generate_public_key, xor_decrypt, xor_encrypt, KeyStore};

#[test]
fn xor_encrypt_then_decrypt_is_identity() {
    for plain in ["www.example", "/", "SELECT * FROM users", "", "数据库查询"] {
        for key in ["abc123", "k", "0f3359aabbccdd"] {
            let cipher = xor_encrypt(plain, key);
            assert_eq!(
                xor_decrypt(&cipher, key).as_deref(),
                Some(plain),
                "plain={plain:?} key={key:?}"
            );
        }
    }
}

#[test]
fn xor_decrypt_rejects_malformed_ciphertext() {
    assert_eq!(xor_decrypt("zz", "key"), None);
    assert_eq!(xor_decrypt("abc", "key"), None); // odd length
}

#[test]
fn decrypt_with_wrong_key_does_not_round_trip() {
    let cipher = xor_encrypt("www.example", "right-key");
    let wrong = xor_decrypt(&cipher, "wrong-key");
    assert_ne!(wrong.as_deref(), Some("www.example"));
}

#[test]
fn peers_derive_the_same_shared_secret() {
    let mut a = KeyStore::new(Addr(1));
    let mut b = KeyStore::new(Addr(2));

    let a_pub = generate_public_key(Addr(1));
    let b_pub = generate_public_key(Addr(2));

    assert!(a.accept(Addr(2), &b_pub));
    assert!(b.accept(Addr(1), &a_pub));

    assert_eq!(a.key_for(Addr(2)), b.key_for(Addr(1)));

    let cipher = a.encrypt_for(Addr(2), "secret payload").expect("key held");
    assert_eq!(
        b.decrypt_from(Addr(1), &cipher).as_deref(),
        Some("secret payload")
    );
}

#[test]
fn duplicate_key_exchange_is_not_answered_again() {
    let mut a = KeyStore::new(Addr(1));
    let b_pub = generate_public_key(Addr(2));

    assert!(a.accept(Addr(2), &b_pub), "first exchange owes a reply");
    assert!(!a.accept(Addr(2), &b_pub), "duplicate must stay silent");
    assert!(a.key_for(Addr(2)).is_some());
}

#[test]
fn exchange_frame_carries_our_public_key() {
    let a = KeyStore::new(Addr(7));
    let frame = a.exchange_frame(Addr(9));
    assert_eq!(frame.src, Addr(7));
    assert_eq!(frame.dst, Addr(9));
    match frame.kind {
        Kind::KeyExchange(kx) => assert_eq!(kx.public_key, generate_public_key(Addr(7))),
        other => panic!("expected key exchange, got {}", other.name()),
    }
}
