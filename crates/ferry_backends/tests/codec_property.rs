//! Property tests for the built-in codecs.

use ferry_backends::{CsvCodec, JsonLinesCodec};
use ferry_convert::{Codec, Params};
use ferry_resource::Records;
use proptest::prelude::*;
use serde_json::{Value, json};

fn scalar() -> impl Strategy<Value = Value> + Clone {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z ]{0,6}".prop_map(Value::String),
    ]
}

fn table<S: Strategy<Value = Value> + Clone>(cell: S) -> impl Strategy<Value = Records> {
    (1usize..4).prop_flat_map(move |width| {
        proptest::collection::vec(proptest::collection::vec(cell.clone(), width), 0..6).prop_map(
            move |rows| Records::from_rows((0..width).map(|i| format!("c{i}")), rows),
        )
    })
}

proptest! {
    #[test]
    fn csv_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = CsvCodec.decode(&bytes, &Params::new());
    }

    #[test]
    fn csv_keeps_text_cells(records in table("x[a-z ,\"\n]{0,8}".prop_map(Value::String))) {
        let bytes = CsvCodec.encode(&records, &Params::new()).unwrap();
        let decoded = CsvCodec.decode(&bytes, &Params::new()).unwrap();
        prop_assert_eq!(decoded.columns(), records.columns());
        prop_assert_eq!(decoded.rows(), records.rows());
    }

    #[test]
    fn json_lines_keep_scalars(records in table(scalar())) {
        let bytes = JsonLinesCodec.encode(&records, &Params::new()).unwrap();
        prop_assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), records.len());
        let decoded = JsonLinesCodec.decode(&bytes, &Params::new()).unwrap();
        prop_assert_eq!(decoded.to_maps(), records.to_maps());
    }
}
