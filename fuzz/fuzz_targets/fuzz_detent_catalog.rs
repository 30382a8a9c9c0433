#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sheet_core::{DetentCatalog, RawDetent, RawValue};

#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Arbitrary)]
struct FuzzDetent {
    kind: Option<String>,
    value: Option<FuzzValue>,
    identifier: Option<String>,
}

impl From<FuzzDetent> for RawDetent {
    fn from(d: FuzzDetent) -> Self {
        RawDetent {
            kind: d.kind,
            value: d.value.map(|v| match v {
                FuzzValue::Text(s) => RawValue::Text(s),
                FuzzValue::Number(n) => RawValue::Number(n),
            }),
            identifier: d.identifier,
        }
    }
}

fuzz_target!(|input: (Vec<FuzzDetent>, usize)| {
    let (detents, index) = input;
    let raw: Vec<RawDetent> = detents.into_iter().map(RawDetent::from).collect();
    let build = DetentCatalog::build(&raw);
    let catalog = build.catalog;

    assert!(!catalog.is_empty());
    let keys: Vec<f64> = catalog.iter().map(|d| d.sort_key()).collect();
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));

    let (resolved, _) = catalog.resolve_index(index);
    assert!(catalog.contains_index(resolved));

    let rebuilt = DetentCatalog::build(&catalog.to_raw()).catalog;
    assert_eq!(rebuilt.identifiers(), catalog.identifiers());
});
