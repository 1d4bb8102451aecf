//! Property tests for chunking and the flat index

use proptest::prelude::*;

use claim_rag::ingestion::TextChunker;
use claim_rag::retrieval::PolicyIndex;
use claim_rag::types::Chunk;

fn chunker_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

fn index_fixture() -> impl Strategy<Value = (Vec<Vec<f32>>, Vec<f32>)> {
    (1usize..6).prop_flat_map(|dim| {
        (
            prop::collection::vec(prop::collection::vec(-10.0f32..10.0, dim), 1..20),
            prop::collection::vec(-10.0f32..10.0, dim),
        )
    })
}

fn build_index(vectors: Vec<Vec<f32>>) -> PolicyIndex {
    let chunks = (0..vectors.len())
        .map(|i| Chunk {
            index: i,
            char_start: i,
            char_end: i + 1,
            text: format!("clause {}", i),
        })
        .collect();
    PolicyIndex::new(chunks, vectors).unwrap()
}

proptest! {
    #[test]
    fn chunks_reconstruct_the_text(
        text in "[a-zé .]{0,200}",
        (size, overlap) in chunker_params(),
    ) {
        let chunker = TextChunker::new(size, overlap).unwrap();
        let chunks = chunker.chunk(&text);

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { overlap };
            rebuilt.extend(chunk.text.chars().skip(skip));
        }
        prop_assert_eq!(rebuilt, text);
    }

    #[test]
    fn chunks_respect_size_and_overlap(
        text in "[a-z0-9 ]{1,200}",
        (size, overlap) in chunker_params(),
    ) {
        let chunker = TextChunker::new(size, overlap).unwrap();
        let chunks = chunker.chunk(&text);

        prop_assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, i);
            prop_assert!(chunk.text.chars().count() <= size);
            prop_assert_eq!(chunk.char_end - chunk.char_start, chunk.text.chars().count());
        }
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(size - overlap).collect();
            let head: String = pair[1].text.chars().take(overlap).collect();
            prop_assert_eq!(tail, head);
            prop_assert_eq!(pair[1].char_start - pair[0].char_start, size - overlap);
        }
    }

    #[test]
    fn search_is_bounded_and_sorted(
        (vectors, query) in index_fixture(),
        k in 0usize..25,
    ) {
        let count = vectors.len();
        let index = build_index(vectors);
        let hits = index.search(&query, k).unwrap();

        prop_assert!(hits.len() <= k);
        prop_assert_eq!(hits.len(), k.min(count));
        for pair in hits.windows(2) {
            prop_assert!(pair[0].distance <= pair[1].distance);
        }
        for hit in &hits {
            prop_assert!(hit.chunk.index < count);
        }
    }

    #[test]
    fn own_vector_is_nearest(
        (vectors, _query) in index_fixture(),
        pick in any::<prop::sample::Index>(),
    ) {
        let position = pick.index(vectors.len());
        let target = vectors[position].clone();
        let index = build_index(vectors);

        let hits = index.search(&target, 1).unwrap();
        prop_assert_eq!(hits.len(), 1);
        prop_assert_eq!(hits[0].distance, 0.0);
        prop_assert_eq!(index.vector(hits[0].chunk.index), Some(target.as_slice()));
    }
}
