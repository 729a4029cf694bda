//! Recording lifecycle: tags, seeding, extraction and replay.

use adsweep::{Active, Arity, Error, Evaluator, Scalar, TapeStore};

fn poly<T: Scalar>(x: &[T]) -> Vec<T> {
    vec![x[0] * x[1] + x[2].sin(), x[0].exp() / x[2]]
}

#[test]
fn duplicate_tag_while_open() {
    let store = TapeStore::<f64>::new();
    let rec = store.begin_recording(7).unwrap();
    assert_eq!(store.begin_recording(7).unwrap_err(), Error::DuplicateTag { tag: 7 });
    // A different tag can be recorded concurrently.
    let other = store.begin_recording(8).unwrap();
    let y = other.seed(1.0);
    other.extract(y).unwrap();
    other.end().unwrap();

    let x = rec.seed(2.0);
    rec.extract(x * x).unwrap();
    rec.end().unwrap();
    assert_eq!(store.tags(), vec![7, 8]);
}

#[test]
fn seeded_without_output_is_rejected() {
    let store = TapeStore::<f64>::new();
    let rec = store.begin_recording(3).unwrap();
    let x = rec.seed(1.0);
    let _ = x * 2.0;
    assert_eq!(rec.end().unwrap_err(), Error::UnclosedSeed { tag: 3, seeded: 1 });

    // Nothing stored and the tag is free again.
    assert!(!store.contains(3));
    assert!(store.begin_recording(3).is_ok());
}

#[test]
fn dropped_recording_releases_tag() {
    let store = TapeStore::<f64>::new();
    {
        let rec = store.begin_recording(1).unwrap();
        let x = rec.seed(0.5);
        rec.extract(x.sqrt()).unwrap();
        // dropped without end()
    }
    assert!(!store.contains(1));
    assert!(store.begin_recording(1).is_ok());
}

#[test]
fn clear_unknown_tag_is_noop() {
    let store = TapeStore::<f64>::new();
    store.clear(42);
    store.record(1, &[1.0], |x| vec![x[0] + 1.0]).unwrap();
    store.clear(42);
    assert_eq!(store.len(), 1);
    store.clear(1);
    assert!(store.is_empty());
}

#[test]
fn replay_reproduces_recorded_outputs() {
    let store = TapeStore::<f64>::new();
    let x = [0.7, -1.3, 2.1];
    let recorded = store.record(5, &x, |v| poly(v)).unwrap();
    let eval = Evaluator::new(&store);

    // Move away and come back.
    eval.forward_sweep(5, &[1.0, 1.0, 1.0]).unwrap();
    let replayed = eval.forward_sweep(5, &x).unwrap();
    assert_eq!(recorded, replayed);
    assert_eq!(replayed, poly(&x));
}

#[test]
fn replay_at_new_inputs_matches_direct_evaluation() {
    let store = TapeStore::<f64>::new();
    store.record(5, &[0.7, -1.3, 2.1], |v| poly(v)).unwrap();
    let eval = Evaluator::new(&store);
    for x in [[1.0, 2.0, 3.0], [-0.5, 0.25, 1.5], [0.0, 0.0, -2.0]] {
        assert_eq!(eval.forward_sweep(5, &x).unwrap(), poly(&x));
    }
}

#[test]
fn mismatched_inputs_fail() {
    let store = TapeStore::<f64>::new();
    store.record(2, &[1.0, 2.0, 3.0], |v| poly(v)).unwrap();
    let eval = Evaluator::new(&store);

    for bad in [&[1.0, 2.0][..], &[1.0, 2.0, 3.0, 4.0][..], &[][..]] {
        assert_eq!(
            eval.forward_sweep(2, bad).unwrap_err(),
            Error::TraceMismatch {
                tag: 2,
                what: Arity::Inputs,
                expected: 3,
                found: bad.len(),
            }
        );
    }
}

#[test]
fn unknown_tag_fails() {
    let store = TapeStore::<f64>::new();
    let eval = Evaluator::new(&store);
    assert_eq!(eval.forward_sweep(9, &[1.0]).unwrap_err(), Error::UnknownTag { tag: 9 });
    assert!(store.trace_len(9).is_err());
}

#[test]
fn rerecording_overwrites() {
    let store = TapeStore::<f64>::new();
    store.record(1, &[2.0], |x| vec![x[0] * 3.0]).unwrap();
    store
        .record(1, &[2.0, 5.0], |x| vec![x[0] * x[1], x[1]])
        .unwrap();
    assert_eq!(store.trace_len(1).unwrap().0, 2);
    let eval = Evaluator::new(&store);
    assert_eq!(eval.forward_sweep(1, &[3.0, 4.0]).unwrap(), vec![12.0, 4.0]);
}

#[test]
fn constant_outputs_keep_their_position() {
    let store = TapeStore::<f64>::new();
    let rec = store.begin_recording(0).unwrap();
    let x = rec.seed(3.0);
    assert_eq!(rec.extract(Active::constant(1.5)).unwrap(), 1.5);
    assert_eq!(rec.extract(x * x).unwrap(), 9.0);
    rec.end().unwrap();

    let eval = Evaluator::new(&store);
    assert_eq!(eval.forward_sweep(0, &[4.0]).unwrap(), vec![1.5, 16.0]);
    assert_eq!(eval.jacobian(0, &[4.0]).unwrap(), vec![vec![0.0], vec![8.0]]);
}

#[test]
fn f32_traces_record_and_replay() {
    let store = TapeStore::<f32>::new();
    store.record(0, &[1.0_f32, 2.0], |x| vec![x[0] * x[1] + 1.0]).unwrap();
    let eval = Evaluator::new(&store);
    assert_eq!(eval.forward_sweep(0, &[3.0, 4.0]).unwrap(), vec![13.0]);
    assert_eq!(eval.gradient_sweep(0, &[3.0, 4.0]).unwrap(), vec![4.0, 3.0]);
}

#[test]
fn actives_do_not_cross_recordings() {
    let store = TapeStore::<f64>::new();
    let first = store.begin_recording(1).unwrap();
    let second = store.begin_recording(2).unwrap();
    let x = first.seed(3.0);
    let y = second.seed(5.0);

    let z = x * y;
    assert_eq!(z.value(), 15.0);
    assert_eq!(first.extract(z).unwrap(), 15.0);
    second.extract(y * 2.0).unwrap();

    // Both traces saw the mixed product.
    assert_eq!(first.end().unwrap_err(), Error::ForeignActive { tag: 1 });
    assert_eq!(second.end().unwrap_err(), Error::ForeignActive { tag: 2 });
    assert!(store.is_empty());
    assert!(store.begin_recording(1).is_ok());
}

#[test]
fn foreign_output_is_rejected() {
    let store = TapeStore::<f64>::new();
    let first = store.begin_recording(1).unwrap();
    let second = store.begin_recording(2).unwrap();
    let _pad = first.seed(0.0);
    let x = first.seed(3.0);
    let y = second.seed(5.0);

    assert_eq!(first.extract(y).unwrap_err(), Error::ForeignActive { tag: 1 });
    first.extract(x * x).unwrap();
    assert_eq!(first.end().unwrap_err(), Error::ForeignActive { tag: 1 });

    // The other recording is untouched.
    second.extract(y * y).unwrap();
    second.end().unwrap();
    let eval = Evaluator::new(&store);
    assert!(!store.contains(1));
    assert_eq!(eval.forward_sweep(2, &[4.0]).unwrap(), vec![16.0]);
    assert_eq!(eval.gradient_sweep(2, &[4.0]).unwrap(), vec![8.0]);
}
