//! Property-based tests for view ordering.
//!
//! After any interleaving of source pushes, a flushed view lists exactly the
//! source's rows, sorted by the requested ordering with the primary key as
//! the final tie-break.

use proptest::prelude::*;
use ripple_core::{row, DataType, Direction, Row, SortOrder, TableSchema};
use ripple_incremental::{MemorySource, SourceChange};
use ripple_reactive::{ArrayView, Format};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Upsert { id: i64, b: i64 },
    Remove { id: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..12, 0i64..5).prop_map(|(id, b)| Op::Upsert { id, b }),
        1 => (0i64..12).prop_map(|id| Op::Remove { id }),
    ]
}

fn source() -> MemorySource {
    MemorySource::new(
        TableSchema::new("t")
            .column("id", DataType::Int64)
            .column("b", DataType::Int64)
            .primary_key(&["id"])
            .unwrap(),
    )
}

/// Applies `op` to both the source and the model of its contents.
fn apply(source: &MemorySource, model: &mut BTreeMap<i64, i64>, op: &Op) {
    match *op {
        Op::Upsert { id, b } => {
            let new = row! { "id" => id, "b" => b };
            match model.insert(id, b) {
                Some(old_b) => source.push(SourceChange::Edit {
                    old: row! { "id" => id, "b" => old_b },
                    new,
                }),
                None => source.push(SourceChange::Add(new)),
            }
            .unwrap();
        }
        Op::Remove { id } => {
            if let Some(b) = model.remove(&id) {
                source
                    .push(SourceChange::Remove(row! { "id" => id, "b" => b }))
                    .unwrap();
            }
        }
    }
}

fn expected(model: &BTreeMap<i64, i64>, descending: bool) -> Vec<Row> {
    let mut rows: Vec<(i64, i64)> = model.iter().map(|(id, b)| (*b, *id)).collect();
    rows.sort();
    if descending {
        // Descending on `b`, ascending on the key.
        rows.sort_by(|x, y| y.0.cmp(&x.0).then(x.1.cmp(&y.1)));
    }
    rows.into_iter()
        .map(|(b, id)| row! { "id" => id, "b" => b })
        .collect()
}

proptest! {
    /// Property: flushed view rows equal the sorted source contents.
    #[test]
    fn view_matches_sorted_source(
        initial in prop::collection::vec(op_strategy(), 0..10),
        pushes in prop::collection::vec(op_strategy(), 0..40),
        flush_every in 1usize..6,
        descending in any::<bool>(),
    ) {
        let source = source();
        let mut model = BTreeMap::new();
        for op in &initial {
            apply(&source, &mut model, op);
        }

        let direction = if descending { Direction::Desc } else { Direction::Asc };
        let sort = SortOrder::new().then("b", direction).then("id", Direction::Asc);
        let view = ArrayView::new(source.connect(sort, None).unwrap(), Format::list());
        view.hydrate().unwrap();
        prop_assert_eq!(view.data().rows(), expected(&model, descending));

        for (i, op) in pushes.iter().enumerate() {
            apply(&source, &mut model, op);
            if i % flush_every == 0 {
                view.flush();
                prop_assert_eq!(view.data().rows(), expected(&model, descending));
            }
        }
        view.flush();
        prop_assert_eq!(view.data().rows(), expected(&model, descending));
    }
}
