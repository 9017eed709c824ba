#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlfilter::{Columns, Kind, Mapper, MapperKind, filter};

#[derive(Debug, Arbitrary)]
pub struct FilterInput<'a> {
    pub source: &'a str,
    pub skip_name: bool,
}

fuzz_target!(|input: FilterInput| {
    let columns = Columns::new()
        .with("name", Kind::String)
        .with("age", Kind::Number)
        .with("status", Kind::Boolean);
    let mut mapper = Mapper::new();
    if input.skip_name {
        mapper.insert("name", MapperKind::skip(|_, _| {}));
    }

    // Whatever the input, the compiler answers with a result, never a panic
    if let Ok((query, args)) = filter(&columns, input.source, &mapper) {
        assert_eq!(query.matches('?').count(), args.len());
    }
});
