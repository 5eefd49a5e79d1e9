#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use woframe_core::ElementId;

#[derive(Debug, Arbitrary)]
enum Op {
    AppendZero,
    AppendInt(u64),
    IncrementLast,
    DeleteLast,
    DeleteAll,
}

fuzz_target!(|input: (&str, Vec<Op>)| {
    let (seed, ops) = input;
    let mut id = ElementId::parse(seed);

    for op in ops {
        let before = id.as_str().to_owned();
        let appends = matches!(op, Op::AppendZero | Op::AppendInt(_));
        match op {
            Op::AppendZero => id.append_zero(),
            Op::AppendInt(n) => id.append_int(n),
            Op::IncrementLast => id.increment_last(),
            Op::DeleteLast => id.delete_last(),
            Op::DeleteAll => id.delete_all(),
        }
        // the string form and the segment count stay in step
        assert_eq!(id.segments().count(), id.depth());
        assert_eq!(id.is_empty(), id.as_str().is_empty());
        assert!(id.is_prefix_of(id.as_str()));
        // appending keeps the old ID as an ancestor
        if appends {
            assert!(ElementId::parse(&before).is_prefix_of(id.as_str()));
        }
    }
});
