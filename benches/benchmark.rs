use concept_space_vectorizer::{
    ConceptSpace, EngineConfig, IndexBuilder, IndexPaths, MemoryCorpus, PostingsInverter, SimpleTokenizer,
    SparseConceptVector,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use indexmap::IndexMap;

const WORDS: &[&str] = &[
    "rust", "memory", "safety", "python", "snake", "language", "compiler", "asia", "africa", "river",
    "mountain", "ocean", "music", "guitar", "piano", "physics", "energy", "quantum", "history", "empire",
    "trade", "market", "bank", "money", "city", "train", "bridge", "tower", "island", "forest",
];

/// deterministic synthetic articles
fn synthetic_corpus(docs: u32) -> MemoryCorpus {
    let tokenizer = SimpleTokenizer::default();
    let corpus = MemoryCorpus::new();
    let mut state = 0x9E37_79B9u32;
    for id in 1..=docs {
        let mut body = Vec::new();
        for _ in 0..60 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            body.push(WORDS[(state as usize) % WORDS.len()]);
        }
        let title = WORDS[(id as usize * 7) % WORDS.len()];
        corpus.add_text(id, title, &body.join(" "), &tokenizer);
    }
    corpus
}

fn pipeline_benchmark(c: &mut Criterion) {
    let corpus = synthetic_corpus(2000);
    let config = EngineConfig::default().with_rare_term_doc_freq(0);
    let dir = tempfile::tempdir().expect("temp dir");
    let paths = IndexPaths::new(dir.path());

    c.bench_function("build_index", |b| {
        b.iter(|| {
            IndexBuilder::<concept_space_vectorizer::DefaultTFIDFEngine>::new(config.clone())
                .expect("config")
                .build(&corpus, &paths)
                .expect("build")
        });
    });

    let space: ConceptSpace = ConceptSpace::open(&paths, &config).expect("open");
    c.bench_function("relatedness", |b| {
        b.iter(|| space.relatedness(black_box("quantum physics energy"), black_box("piano music guitar")));
    });
}

fn prune_benchmark(c: &mut Criterion) {
    let inverter = PostingsInverter::new(&EngineConfig::default());
    let group: IndexMap<u32, f64> = (1..=50_000u32).map(|i| (i, 1.0 / i as f64)).collect();
    c.bench_function("prune_50k", |b| b.iter(|| inverter.prune("term", black_box(&group))));

    let vector: SparseConceptVector = (1..=50_000u32).map(|i| (i, ((i * 31) % 977) as f64)).collect();
    c.bench_function("ordered_iter_50k", |b| b.iter(|| vector.ordered_iter().take(100).count()));
}

criterion_group!(benches, pipeline_benchmark, prune_benchmark);
criterion_main!(benches);
