use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use lp_core::{
    Difficulty, EngineConfig, MemoryStore, ProgressionEngine, QuestionReviewState,
    ReviewOutcome, TopicId, review,
};

fn bench_review(c: &mut Criterion) {
    let state = QuestionReviewState::new("q-1", Difficulty::Medium);
    let outcome = ReviewOutcome {
        correct: true,
        response_time: 2.5,
        attempts: 1,
        reviewed_at: 1_700_000_000,
    };
    c.bench_function("review_single", |b| {
        b.iter(|| review(black_box(&state), black_box(&outcome)))
    });
}

fn bench_record_answer(c: &mut Criterion) {
    let mut engine = ProgressionEngine::open(MemoryStore::new(), EngineConfig::default());
    let topic = TopicId::new("verbs").unwrap();
    for i in 0..500 {
        engine
            .record_answer(&topic, &format!("q-{i}"), Difficulty::Easy, true, 2.0, 1)
            .unwrap();
    }

    c.bench_function("record_answer_500_history", |b| {
        b.iter(|| {
            engine
                .record_answer(&topic, black_box("q-250"), Difficulty::Easy, true, 2.0, 1)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_review, bench_record_answer);
criterion_main!(benches);
