use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use lp_core::{
    Difficulty, ProgressStore, QuestionReviewState, TopicId, TopicMap, TopicProgress,
};
use lp_store::Store;

fn make_topics(n_topics: usize, n_questions: usize) -> TopicMap {
    (0..n_topics)
        .map(|t| {
            let id = TopicId::new(&format!("topic-{t}")).unwrap();
            let mut p = TopicProgress::new(id.clone());
            p.history = (0..n_questions)
                .map(|q| QuestionReviewState::new(&format!("q-{q}"), Difficulty::Easy))
                .collect();
            (id, p)
        })
        .collect()
}

fn bench_save_topic(c: &mut Criterion) {
    let store = Store::open_in_memory().unwrap();
    let topics = make_topics(1, 200);
    let progress = topics.values().next().unwrap();

    c.bench_function("save_topic_200_reviews", |b| {
        b.iter(|| store.save_topic(black_box(progress)).unwrap())
    });
}

fn bench_save_and_load_all(c: &mut Criterion) {
    let store = Store::open_in_memory().unwrap();
    let topics = make_topics(50, 40);

    c.bench_function("save_topics_50x40", |b| {
        b.iter(|| store.save_topics(black_box(&topics)).unwrap())
    });

    store.save_topics(&topics).unwrap();
    c.bench_function("load_topics_50x40", |b| b.iter(|| store.load_topics().unwrap()));
}

criterion_group!(benches, bench_save_topic, bench_save_and_load_all);
criterion_main!(benches);
