//! Property tests for encryption contexts.

use std::time::Duration;

use magma_kit::KeySource;
use magma_runtime::{ContextManager, ContextSettings};
use proptest::collection::vec;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

proptest! {
    #[test]
    fn encrypt_last_then_decrypt_last_round_trips(
        key in any::<[u8; 32]>(),
        iv in vec(any::<u8>(), 8..48),
        plain in vec(any::<u8>(), 0..200),
    ) {
        let manager = ContextManager::new(Duration::ZERO);
        let settings = ContextSettings::new(
            KeySource::Bytes(key.to_vec()),
            KeySource::Bytes(iv.clone()),
            iv.len(),
        );
        let mut rng = ChaCha20Rng::from_seed([0u8; 32]);

        let mut enc = manager.new_context(&settings, &mut rng).expect("ctx");
        let mut ct = Vec::new();
        let ct_len = enc.encrypt_last(&plain, &mut ct);
        prop_assert_eq!(ct_len % enc.data_alignment(), 0);
        prop_assert!(ct_len > plain.len());
        manager.free_context(enc);

        let mut dec = manager.new_context(&settings, &mut rng).expect("ctx");
        let mut out = Vec::new();
        prop_assert_eq!(dec.decrypt_last(&ct, &mut out).expect("decrypt"), plain.len());
        prop_assert_eq!(out, plain);
        manager.free_context(dec);
        prop_assert_eq!(manager.keys().keys_count(), 0);
    }

    #[test]
    fn streaming_then_last_matches_single_last(
        blocks in 0usize..8,
        tail in vec(any::<u8>(), 0..8),
    ) {
        let manager = ContextManager::new(Duration::ZERO);
        let settings = ContextSettings::new(
            KeySource::Bytes(vec![0x5a; 32]),
            KeySource::Bytes(vec![0xa5; 24]),
            24,
        );
        let mut rng = ChaCha20Rng::from_seed([1u8; 32]);
        let mut plain = vec![0x33u8; blocks * 8];
        plain.extend_from_slice(&tail);

        let mut single = manager.new_context(&settings, &mut rng).expect("ctx");
        let mut expected = Vec::new();
        single.encrypt_last(&plain, &mut expected);

        let mut streamed = manager.new_context(&settings, &mut rng).expect("ctx");
        let mut head = plain[..blocks * 8].to_vec();
        streamed.encrypt_in_place(&mut head);
        let mut last = Vec::new();
        streamed.encrypt_last(&plain[blocks * 8..], &mut last);
        head.extend_from_slice(&last);

        prop_assert_eq!(head, expected);
    }
}
