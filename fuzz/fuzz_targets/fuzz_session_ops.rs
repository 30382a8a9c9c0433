#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sheet_core::{AttributeUpdate, HostConfiguration, Instant, RawDetent};
use sheet_runtime::{Coordinator, Session, SheetConfig, SheetHost};

struct NullHost;

impl SheetHost for NullHost {
    fn present(&mut self, _config: &HostConfiguration) {}
    fn dismiss(&mut self) {}
    fn teardown(&mut self) {}
    fn select_detent(&mut self, _index: usize) {}
    fn apply_configuration(&mut self, _config: &HostConfiguration) {}
}

#[derive(Debug, Arbitrary)]
enum Op {
    Attach(u8),
    Detach(u8),
    Present(u8),
    Dismiss(u8),
    SetOpen(u8, bool),
    Snap(u8, u8),
    DidPresent(u8),
    WillDismiss(u8, bool),
    BackdropTap(u8),
    DidDismiss(u8),
    DetentChanged(u8, u8),
    Fractions(u8, Vec<u8>),
    Batch(u8, bool, bool),
    Reuse(u8),
}

fuzz_target!(|ops: Vec<Op>| {
    let coordinator = Coordinator::new();
    let config = SheetConfig::default();
    let sessions: Vec<Session> = (0..3)
        .map(|_| Session::new(NullHost, &coordinator, &config))
        .collect();
    let pick = |i: u8| &sessions[usize::from(i) % sessions.len()];

    for op in ops {
        match op {
            Op::Attach(i) => pick(i).on_host_attach(),
            Op::Detach(i) => pick(i).on_host_detach(),
            Op::Present(i) => pick(i).present(),
            Op::Dismiss(i) => pick(i).dismiss(),
            Op::SetOpen(i, open) => pick(i).apply_attribute_update(AttributeUpdate::Open(open)),
            Op::Snap(i, d) => pick(i).snap_to_detent(usize::from(d)),
            Op::DidPresent(i) => pick(i).host_did_present(),
            Op::WillDismiss(i, drag) => pick(i).host_will_dismiss(drag),
            Op::BackdropTap(i) => pick(i).host_backdrop_tapped(Instant::now()),
            Op::DidDismiss(i) => pick(i).host_did_dismiss(Instant::now()),
            Op::DetentChanged(i, d) => pick(i).host_detent_changed(usize::from(d)),
            Op::Fractions(i, values) => pick(i).apply_attribute_update(AttributeUpdate::Detents(
                values
                    .into_iter()
                    .map(|v| RawDetent::fraction(f64::from(v) / 200.0))
                    .collect(),
            )),
            Op::Batch(i, open, grabber) => {
                let batch = pick(i).batch();
                batch
                    .apply(AttributeUpdate::GrabberVisible(grabber))
                    .apply(AttributeUpdate::Open(open));
            }
            Op::Reuse(i) => pick(i).prepare_for_reuse(),
        }

        let open = sessions.iter().filter(|s| s.is_open()).count();
        assert!(open <= 1);
        for session in &sessions {
            assert!(session.catalog().contains_index(session.current_detent_index()));
        }
    }
});
