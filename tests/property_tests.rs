//! Property-based checks for the round-trip/idempotence laws named in
//! spec §8: Telnet IAC escaping round-trips for arbitrary byte
//! sequences, and a `send_string` at exactly a field's `maxEntryLength`
//! always succeeds while one byte more always raises `Truncation`.

use proptest::prelude::*;

use tn5250_client::screen::{FieldAttribute, Screen};
use tn5250_client::telnet::TelnetFramer;
use tn5250_client::{Error, Key, Keyboard};

fn init() {
    let _ = env_logger::try_init();
}

proptest! {
    /// `unframe(frame(data)) == data` for any byte sequence (spec §8).
    #[test]
    fn telnet_frame_round_trips_arbitrary_bytes(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        init();
        let framed = TelnetFramer::frame(&data);
        let mut framer = TelnetFramer::new();
        let events = framer.feed(&framed).unwrap();
        prop_assert_eq!(events.len(), 1);
        match &events[0] {
            tn5250_client::telnet::FramerEvent::Record(record) => prop_assert_eq!(record, &data),
            _ => prop_assert!(false, "expected a single record"),
        }
    }

    /// A field of length `len` accepts any string of exactly `len`
    /// characters and rejects one character more, never touching the
    /// plane on the rejected call (spec §8 boundary behaviors).
    #[test]
    fn send_string_boundary_matches_max_entry_length(
        len in 1usize..40,
        extra in proptest::sample::select(vec!['X', 'Y', 'Z']),
    ) {
        init();
        let kb = Keyboard::new("037");
        let mut screen = Screen::new(1, 80);
        screen.oia_mut().clear_inhibit();
        screen.fields_mut().push(0, len, FieldAttribute(0));

        let exact: String = std::iter::repeat('A').take(len).collect();
        prop_assert!(kb.send_string(&mut screen, &exact).is_ok());
        prop_assert_eq!(screen.get_field_text(0).unwrap(), exact);

        let mut screen2 = Screen::new(1, 80);
        screen2.oia_mut().clear_inhibit();
        screen2.fields_mut().push(0, len, FieldAttribute(0));
        let before = screen2.get_field_text(0).unwrap();
        let too_long: String = std::iter::repeat('A').take(len).chain(std::iter::once(extra)).collect();
        let err = kb.send_string(&mut screen2, &too_long).unwrap_err();
        prop_assert!(matches!(err, Error::Field(tn5250_client::error::FieldError::Truncation { .. })));
        prop_assert_eq!(screen2.get_field_text(0).unwrap(), before);
    }

    /// Cursor left/right movement never leaves `[0, len)` regardless of
    /// how many steps are taken (spec §3 position invariant).
    #[test]
    fn cursor_movement_stays_in_bounds(steps in proptest::collection::vec(proptest::bool::ANY, 0..200)) {
        init();
        let kb = Keyboard::new("037");
        let mut screen = Screen::new(5, 10);
        screen.oia_mut().clear_inhibit();
        for go_right in steps {
            let key = if go_right { Key::Right } else { Key::Left };
            kb.send_key(&mut screen, key).unwrap();
            prop_assert!(screen.cursor().pos < screen.len());
        }
    }
}
