//! Performance benchmarks for a3s-tokenize
//!
//! Run with: cargo bench

use a3s_tokenize::mask::mask;
use a3s_tokenize::{
    integrate, DuplicateResultPolicy, KeyMaterial, MaskShape, MemoryVaultStore,
    MissingResultPolicy, PolicySet, RecordSet, SecretKey, TokenGenerator, TokenPolicy, TokenRule,
    TokenType, TokenizationEngine, Vault,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn keys() -> KeyMaterial {
    KeyMaterial {
        vault_key: SecretKey::from_bytes([0x11; 32]),
        hash_key: SecretKey::from_bytes([0x22; 32]),
    }
}

fn customers(n: usize) -> RecordSet {
    RecordSet::from_rows(
        ["customer_id", "email", "ssn"],
        (0..n).map(|i| {
            vec![
                i.to_string(),
                format!("user{}@example.com", i),
                format!("{:03}-{:02}-{:04}", i % 1000, i % 100, i % 10_000),
            ]
        }),
    )
}

fn bench_generator(c: &mut Criterion) {
    let generator = TokenGenerator::new(SecretKey::from_bytes([0x22; 32]));
    let hash = TokenRule::of(TokenType::Hash);

    c.bench_function("TokenGenerator HASH", |b| {
        b.iter(|| generator.generate(&hash, "alice@example.com"));
    });

    c.bench_function("mask email", |b| {
        b.iter(|| mask("alice@example.com", MaskShape::Auto, '*'));
    });
}

fn bench_vault(c: &mut Criterion) {
    let vault = Vault::new(MemoryVaultStore::default(), &SecretKey::from_bytes([0x11; 32]));
    let mut n = 0u64;

    c.bench_function("Vault store_original", |b| {
        b.iter(|| {
            n += 1;
            vault
                .store_original(
                    "customers",
                    "ssn",
                    &format!("tk_{:024x}", n),
                    TokenType::Random,
                    "123-45-6789",
                    None,
                )
                .unwrap()
        });
    });
}

fn bench_engine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let records = customers(1_000);
    let mut policies = PolicySet::new();
    policies
        .insert(TokenPolicy::new("customers", "email", TokenRule::of(TokenType::Hash)))
        .unwrap();
    policies
        .insert(TokenPolicy::new("customers", "ssn", TokenRule::Random))
        .unwrap();

    c.bench_function("TokenizationEngine 1k records", |b| {
        b.to_async(&rt).iter(|| async {
            let engine =
                TokenizationEngine::from_keys(&keys(), Arc::new(MemoryVaultStore::default()));
            engine
                .tokenize("customers", &records, &policies)
                .await
                .unwrap()
        });
    });
}

fn bench_integrate(c: &mut Criterion) {
    let raw = customers(10_000);
    let results = RecordSet::from_rows(
        ["customer_id", "risk_score"],
        (0..10_000).step_by(2).map(|i| vec![i.to_string(), "42".to_string()]),
    );

    c.bench_function("integrate 10k rows", |b| {
        b.iter(|| {
            integrate(
                &raw,
                "customer_id",
                &results,
                MissingResultPolicy::PassThrough,
                DuplicateResultPolicy::LastWins,
            )
            .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_generator,
    bench_vault,
    bench_engine,
    bench_integrate
);
criterion_main!(benches);
