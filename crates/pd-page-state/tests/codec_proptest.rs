//! Property tests for encode/decode round trips and truncated input.
#![forbid(unsafe_code)]

use pd_core::Point;
use pd_core::PointF;
use pd_page_state::ExplodedFrameState;
use pd_page_state::ExplodedHttpBody;
use pd_page_state::ExplodedPageState;
use pd_page_state::ReferrerPolicy;
use pd_page_state::ResourceRequestBody;
use pd_page_state::ScrollRestorationType;
use pd_page_state::decode_page_state;
use pd_page_state::encode_page_state;
use pd_page_state::encode_page_state_for_version;
use proptest::prelude::*;

fn nullable_string() -> impl Strategy<Value = Option<String>> {
    prop::option::of(".{0,12}")
}

fn finite() -> impl Strategy<Value = f64> {
    -1.0e6..1.0e6_f64
}

fn request_body() -> impl Strategy<Value = ResourceRequestBody> {
    let element = prop_oneof![
        prop::collection::vec(any::<u8>(), 1..24).prop_map(|bytes| (0_u8, bytes, 0_u64, 0_u64, 0.0)),
        (any::<u64>(), any::<u64>(), finite())
            .prop_map(|(offset, length, mtime)| (1_u8, Vec::new(), offset, length, mtime)),
        (any::<u64>(), any::<u64>(), finite())
            .prop_map(|(offset, length, mtime)| (2_u8, Vec::new(), offset, length, mtime)),
        Just((3_u8, Vec::new(), 0_u64, 0_u64, 0.0)),
    ];

    (prop::collection::vec(element, 0..5), any::<i64>()).prop_map(|(elements, identifier)| {
        let mut body = ResourceRequestBody::new();
        for (index, (kind, bytes, offset, length, mtime)) in elements.into_iter().enumerate() {
            match kind {
                0 => body.append_bytes(&bytes),
                1 => body.append_file_range(format!("/tmp/upload-{index}.bin"), offset, length, mtime),
                2 => body.append_file_system_range(
                    format!("filesystem:https://example.com/temporary/{index}"),
                    offset,
                    length,
                    mtime,
                ),
                _ => body.append_blob(format!("0b1c2d3e-0000-4000-8000-00000000000{index}")),
            }
        }
        body.identifier = identifier;
        body
    })
}

fn http_body() -> impl Strategy<Value = ExplodedHttpBody> {
    (nullable_string(), prop::option::of(request_body()), any::<bool>()).prop_map(
        |(http_content_type, request_body, contains_passwords)| ExplodedHttpBody {
            http_content_type,
            contains_passwords: contains_passwords && request_body.is_some(),
            request_body,
        },
    )
}

fn leaf_frame() -> impl Strategy<Value = ExplodedFrameState> {
    let strings = (
        nullable_string(),
        nullable_string(),
        nullable_string(),
        nullable_string(),
        prop::collection::vec(nullable_string(), 0..4),
    );
    let scroll = (
        any::<bool>(),
        any::<i32>(),
        any::<i32>(),
        finite(),
        finite(),
        finite(),
    );
    let history = (
        any::<i64>(),
        any::<i64>(),
        0..=8_i32,
        any::<bool>(),
        http_body(),
    );

    (strings, scroll, history).prop_map(
        |(
            (url_string, referrer, target, state_object, document_state),
            (did_save, x, y, viewport_x, viewport_y, page_scale_factor),
            (item_sequence_number, document_sequence_number, policy, manual, http_body),
        )| {
            let mut frame = ExplodedFrameState {
                url_string,
                referrer,
                target,
                state_object,
                document_state,
                did_save_scroll_or_scale_state: did_save,
                item_sequence_number,
                document_sequence_number,
                referrer_policy: ReferrerPolicy::from_raw(policy).unwrap_or_default(),
                scroll_restoration_type: if manual {
                    ScrollRestorationType::Manual
                } else {
                    ScrollRestorationType::Auto
                },
                http_body,
                ..ExplodedFrameState::default()
            };
            if did_save {
                frame.scroll_offset = Point::new(x, y);
                frame.visual_viewport_scroll_offset = PointF::new(viewport_x, viewport_y);
                frame.page_scale_factor = page_scale_factor;
            }
            frame
        },
    )
}

fn frame_tree() -> impl Strategy<Value = ExplodedFrameState> {
    leaf_frame().prop_recursive(3, 12, 3, |inner| {
        (leaf_frame(), prop::collection::vec(inner, 0..3)).prop_map(|(mut frame, children)| {
            frame.children = children;
            frame
        })
    })
}

fn page_state() -> impl Strategy<Value = ExplodedPageState> {
    (prop::collection::vec(nullable_string(), 0..4), frame_tree()).prop_map(
        |(mut referenced_files, top)| {
            referenced_files.dedup();
            ExplodedPageState {
                referenced_files,
                top,
            }
        },
    )
}

/// The legacy layout reports an unknown viewport for frames without saved
/// scroll state.
fn as_legacy_reads_it(state: &ExplodedPageState) -> ExplodedPageState {
    let mut expected = state.clone();
    expected.top.walk_mut(&mut |frame: &mut ExplodedFrameState| {
        if !frame.did_save_scroll_or_scale_state {
            frame.visual_viewport_scroll_offset = PointF::new(-1.0, -1.0);
        }
    });
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn current_version_roundtrips(state in page_state()) {
        let bytes = encode_page_state(&state).unwrap_or_else(|_| unreachable!());
        let decoded = decode_page_state(&bytes).unwrap_or_else(|_| unreachable!());
        prop_assert_eq!(decoded, state);
    }

    #[test]
    fn last_legacy_version_roundtrips(state in page_state()) {
        let bytes = encode_page_state_for_version(&state, 25).unwrap_or_else(|_| unreachable!());
        let decoded = decode_page_state(&bytes).unwrap_or_else(|_| unreachable!());
        prop_assert_eq!(decoded, as_legacy_reads_it(&state));
    }

    #[test]
    fn truncated_buffers_fail_cleanly(state in page_state(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_page_state(&state).unwrap_or_else(|_| unreachable!());
        let truncated = &bytes[..cut.index(bytes.len())];
        prop_assert!(decode_page_state(truncated).is_err() || truncated.is_empty());
    }

    #[test]
    fn truncated_legacy_payloads_fail_even_with_a_consistent_header(
        state in page_state(),
        cut in any::<prop::sample::Index>(),
    ) {
        let bytes = encode_page_state_for_version(&state, 25).unwrap_or_else(|_| unreachable!());
        let payload_len = cut.index(bytes.len() - 4);
        let mut truncated = bytes[..4 + payload_len].to_vec();
        truncated[..4].copy_from_slice(&(payload_len as u32).to_le_bytes());
        prop_assert!(decode_page_state(&truncated).is_err());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_page_state(&bytes);
    }
}
