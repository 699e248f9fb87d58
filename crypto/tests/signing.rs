use mint_crypto::ml_dsa::{
    MlDsaPublicKey, MlDsaSecretKey, MlDsaSignature, ML_DSA_PUBLIC_KEY_LEN, ML_DSA_SIGNATURE_LEN,
};
use mint_crypto::traits::{Signature, SigningKey, VerifyKey};
use mint_crypto::{blake2b_224, CryptoError};

#[test]
fn deterministic_keys_sign_and_verify() {
    let sk = MlDsaSecretKey::generate_deterministic(b"admin seed");
    let again = MlDsaSecretKey::generate_deterministic(b"admin seed");
    assert_eq!(sk.verify_key().to_bytes(), again.verify_key().to_bytes());

    let message = [0x42u8; 32];
    let signature = sk.sign(&message);
    assert_eq!(signature.as_bytes().len(), ML_DSA_SIGNATURE_LEN);

    let vk = sk.verify_key();
    assert_eq!(vk.to_bytes().len(), ML_DSA_PUBLIC_KEY_LEN);
    assert!(vk.verify(&message, &signature).is_ok());
    assert_eq!(
        vk.verify(&[0u8; 32], &signature),
        Err(CryptoError::VerificationFailed)
    );
}

#[test]
fn encoded_keys_and_signatures_reload() {
    let sk = MlDsaSecretKey::generate_deterministic(b"reload");
    let vk = MlDsaPublicKey::from_bytes(&sk.verify_key().to_bytes()).unwrap();
    let signature = MlDsaSignature::from_bytes(&sk.sign(b"payload").to_vec()).unwrap();
    assert!(vk.verify(b"payload", &signature).is_ok());

    let restored = MlDsaSecretKey::from_bytes(&sk.to_bytes()).unwrap();
    assert_eq!(restored, sk);
}

#[test]
fn key_hash_is_blake2b_224_of_key_bytes() {
    let vk = MlDsaSecretKey::generate_deterministic(b"hash").verify_key();
    assert_eq!(vk.key_hash(), blake2b_224(&vk.to_bytes()));
    assert_ne!(
        vk.key_hash(),
        MlDsaSecretKey::generate_deterministic(b"other")
            .verify_key()
            .key_hash()
    );
}

#[test]
fn truncated_signature_is_rejected() {
    assert!(matches!(
        MlDsaSignature::from_bytes(&[0u8; 10]),
        Err(CryptoError::InvalidLength { expected: ML_DSA_SIGNATURE_LEN, actual: 10 })
    ));
}
