use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn5250_client::protocol::codes::{CMD_WRITE_TO_DISPLAY, SBA, SF};
use tn5250_client::protocol::Decoder;
use tn5250_client::screen::Screen;

/// A full-screen write: one field per row scattered through 80x24,
/// representative of a populated menu screen.
fn full_screen_write_record() -> Vec<u8> {
    let mut record = vec![CMD_WRITE_TO_DISPLAY, 0x00, 0x40];
    for row in 0..24u8 {
        record.extend_from_slice(&[SBA, row + 1, 1]);
        record.extend_from_slice(&[SF, 0x00]);
        for col in 0..78u8 {
            record.push(0xC1 + (col % 26));
        }
    }
    record
}

fn decode_full_screen(c: &mut Criterion) {
    let decoder = Decoder::new("037");
    let record = full_screen_write_record();
    c.bench_function("decode_full_screen_write", |b| {
        b.iter(|| {
            let mut screen = Screen::new(24, 80);
            decoder.decode_record(&mut screen, black_box(&record)).unwrap();
            black_box(&screen);
        })
    });
}

criterion_group!(benches, decode_full_screen);
criterion_main!(benches);
