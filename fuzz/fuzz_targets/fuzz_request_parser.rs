#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use woframe_core::message::{encode_query, parse_query};
use woframe_core::Request;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    post: bool,
    uri: &'a str,
    cookie_header: &'a str,
    body: &'a [u8],
    urlencoded: bool,
    pairs: Vec<(&'a str, &'a str)>,
}

fuzz_target!(|input: Input<'_>| {
    let mut request = if input.post {
        Request::post(input.uri)
    } else {
        Request::get(input.uri)
    }
    .with_header("Cookie", input.cookie_header);
    if input.urlencoded {
        request = request.with_header("Content-Type", "application/x-www-form-urlencoded");
    }
    let request = request.with_body(input.body);

    // accessors never panic on hostile input
    let _ = request.request_handler_key();
    let _ = request.request_handler_path();
    let _ = request.session_id_candidates();
    let _ = request.form_action();
    let _ = request.accept_languages();
    for key in request.form_value_keys() {
        assert!(request.form_value(key).is_some());
    }

    // encoded pairs decode back unchanged
    let encoded = encode_query(input.pairs.iter().copied());
    let decoded = parse_query(&encoded);
    let expected: Vec<(String, String)> = input
        .pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    assert_eq!(decoded, expected);
});
