use proptest::{prop_assert_eq, prop_oneof, proptest};
use yulark::{Bounds, Engine, EngineParams, Error, Word};

const CAPACITY: usize = 4096;
const CELLS: u64 = (CAPACITY / 8) as u64;

fn engine() -> Engine<()> {
    Engine::new(EngineParams::new(CAPACITY, 256), None, (), &[]).unwrap()
}

proptest! {
    #[test]
    fn read_after_write(idx in 0..CELLS, val: u64) {
        let mut engine = engine();
        let addr = Word::uint(idx);
        engine.write_cell(addr, Word::uint(val)).unwrap();
        prop_assert_eq!(engine.read_cell(addr).unwrap(), Word::uint(val));
    }

    #[test]
    fn writes_do_not_bleed(idx in 1..CELLS - 1, val: u64) {
        let mut engine = engine();
        let below = engine.read_cell(Word::uint(idx - 1)).unwrap();
        let above = engine.read_cell(Word::uint(idx + 1)).unwrap();
        engine.write_cell(Word::uint(idx), Word::uint(val)).unwrap();
        prop_assert_eq!(engine.read_cell(Word::uint(idx - 1)).unwrap(), below);
        prop_assert_eq!(engine.read_cell(Word::uint(idx + 1)).unwrap(), above);
    }

    #[test]
    fn out_of_bounds_is_rejected(raw in prop_oneof![i64::MIN..0, CELLS as i64..i64::MAX]) {
        // negative offsets read as huge unsigned ones
        let addr = Word::data(raw);
        let mut engine = engine();
        prop_assert_eq!(engine.read_cell(addr), Err(Error::InvalidAddress(addr)));
        prop_assert_eq!(
            engine.write_cell(addr, Word::data(0)),
            Err(Error::InvalidAddress(addr))
        );
    }

    #[test]
    fn stepping_stays_inside(lo in 0usize..64, len in 1usize..64, pick: usize) {
        let bounds = Bounds::new(lo, lo + len);
        let idx = lo + pick % len;
        let addr = bounds.check(Word::cell(idx)).unwrap();

        match addr.advance(bounds) {
            Ok(next) => prop_assert_eq!(next.index(), idx + 1),
            Err(e) => {
                prop_assert_eq!(idx + 1, lo + len);
                prop_assert_eq!(e, Error::InvalidAddress(Word::cell(idx + 1)));
            }
        }
        match addr.retreat(bounds) {
            Ok(prev) => prop_assert_eq!(prev.index(), idx - 1),
            Err(_) => prop_assert_eq!(idx, lo),
        }
    }
}

#[test]
fn edges_of_committed_memory() {
    let mut engine = engine();
    let last = Word::uint(CELLS - 1);
    engine.write_cell(last, Word::data(-1)).unwrap();
    assert_eq!(engine.read_cell(last).unwrap(), Word::data(-1));
    assert_eq!(
        engine.read_cell(Word::uint(CELLS)),
        Err(Error::InvalidAddress(Word::uint(CELLS)))
    );
}
