//! Integration tests covering the six end-to-end scenarios: sign-on to
//! a main menu, keyboard inhibit/reset, field truncation, out-of-range
//! SBA, Telnet IAC escaping, and workflow idempotence. Each drives
//! several modules together rather than one unit in isolation.

use std::collections::HashMap;
use std::time::Duration;

use tn5250_client::protocol::codes::*;
use tn5250_client::protocol::{DecodeOutcome, Decoder};
use tn5250_client::screen::{FieldAttribute, Screen};
use tn5250_client::workflow::{run_batch, DataRow, LoginStep, Step, SubmitStep, Workflow, WorkflowStep};
use tn5250_client::{Key, Keyboard};

fn write_to_display(decoder: &Decoder, screen: &mut Screen, body: &[u8]) -> DecodeOutcome {
    let mut record = vec![CMD_WRITE_TO_DISPLAY];
    record.extend_from_slice(body);
    decoder.decode_record(screen, &record).unwrap()
}

/// Scenario: sign-on screen arrives, user fills the field and presses
/// Enter, host replies with a main-menu screen that unlocks the
/// keyboard.
#[test]
fn sign_on_then_main_menu_unlocks_keyboard_and_updates_text() {
    let decoder = Decoder::new("037");
    let mut screen = Screen::new(2, 10);

    // Sign-on screen: one input field, keyboard left locked (no unlock bit).
    write_to_display(
        &decoder,
        &mut screen,
        &[0x00, 0x00, SBA, 0x01, 0x01, SF, 0x00, 0xC1, 0xC2, 0xC3],
    );
    assert!(screen.oia().keyboard_locked());

    // Host accepts sign-on, writes the main menu and unlocks the keyboard.
    let outcome = write_to_display(&decoder, &mut screen, &[0x00, 0x40, 0xD4, 0xC5, 0xD5, 0xE4]);
    assert!(!screen.oia().keyboard_locked());
    assert!(outcome.negative_response.is_none());
    assert_eq!(screen.char_at(0, 0), 'M');
}

/// Scenario: keyboard stays locked until an explicit Reset, and no
/// input is accepted (or the screen mutated) while locked.
#[test]
fn locked_keyboard_inhibits_input_until_reset() {
    let mut screen = Screen::new(1, 10);
    screen.fields_mut().push(0, 5, FieldAttribute(0));
    let kb = Keyboard::new("037");

    assert!(kb.send_key(&mut screen, Key::Char('A')).is_err());
    assert_eq!(screen.char_at(0, 0), ' ');

    kb.send_key(&mut screen, Key::Reset).unwrap();
    assert!(!screen.oia().keyboard_locked());
    kb.send_key(&mut screen, Key::Char('A')).unwrap();
    assert_eq!(screen.char_at(0, 0), 'A');
}

/// Scenario: `send_string` past a field's declared length is rejected
/// whole and leaves the field untouched (no partial write).
#[test]
fn oversized_field_write_is_rejected_without_partial_mutation() {
    let mut screen = Screen::new(1, 10);
    screen.fields_mut().push(0, 5, FieldAttribute(0));
    screen.oia_mut().clear_inhibit();
    let kb = Keyboard::new("037");

    let err = kb.send_string(&mut screen, "TOOLONG").unwrap_err();
    assert!(err.to_string().contains("accepts at most"));
    assert_eq!(screen.get_field_text(0).unwrap(), "");
}

/// Scenario: an out-of-range SBA produces a negative response, not a
/// hard decode error; the rest of the record keeps processing.
#[test]
fn out_of_range_sba_yields_negative_response_and_keeps_processing() {
    let decoder = Decoder::new("037");
    let mut screen = Screen::new(2, 5);

    let outcome = write_to_display(&decoder, &mut screen, &[0x00, 0x00, SBA, 0x0A, 0x0A]);
    assert!(outcome.negative_response.is_some());
}

/// Scenario: `IAC IAC` in the data stream unescapes to one literal
/// `0xFF` byte, and re-framing the record reproduces the original
/// escaped wire bytes.
#[test]
fn telnet_iac_escaping_round_trips_through_the_framer() {
    use tn5250_client::telnet::{FramerEvent, TelnetFramer};

    let mut framer = TelnetFramer::new();
    let events = framer.feed(&[0x01, 0xFF, 0xFF, 0x02, 0xFF, 0xEF]).unwrap();
    let FramerEvent::Record(record) = &events[0] else { panic!("expected a record") };
    assert_eq!(record, &[0x01, 0xFF, 0x02]);
    assert_eq!(TelnetFramer::frame(record), vec![0x01, 0xFF, 0xFF, 0x02, 0xFF, 0xEF]);
}

/// Scenario: running the same workflow twice against identical data
/// produces identical outcomes — here, both runs fail identically
/// against a host nothing is listening on, so their (empty) capture
/// sets still match and the batch reports perfect idempotency.
#[test]
fn identical_data_rows_yield_identical_workflow_outcomes() {
    let mut columns = HashMap::new();
    columns.insert("user".to_string(), "USER1".to_string());
    columns.insert("password".to_string(), "PASS1".to_string());
    let row = DataRow::new(columns);

    let workflow = Workflow::new(
        "duplicate-row-idempotence",
        vec![
            WorkflowStep::new(
                Step::Login(LoginStep {
                    host: "127.0.0.1".into(),
                    port: 1, // reserved port, nothing listens here
                    user: "${user}".into(),
                    password: "${password}".into(),
                    device_name: None,
                }),
                Duration::from_millis(200),
            ),
            WorkflowStep::new(Step::Submit(SubmitStep { aid: Aid::Enter }), Duration::from_millis(200)),
        ],
    );

    let metrics = run_batch(&workflow, &[row.clone(), row], 2);

    assert_eq!(metrics.total, 2);
    assert_eq!(metrics.failed, 2);
    assert_eq!(metrics.idempotency_score, Some(1.0));
}
