use ku_engine::host::RecordingHost;
use ku_engine::{Engine, EngineConfig, LoopState, TraceSource};
use ku_script::Script;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Mov(u32, i32),
    Add(u32, i32),
    Mul(u32, i32),
    Rnd(u32, i32),
    Text(u8),
    Gosub,
    Loop(u32, i32),
}

impl Op {
    fn line(&self) -> String {
        match self {
            Op::Mov(v, n) => format!("mov %{v}, {n}"),
            Op::Add(v, n) => format!("add %{v}, {n}"),
            Op::Mul(v, n) => format!("mul %{v}, {n}"),
            Op::Rnd(v, n) => format!("rnd %{v}, {n}"),
            Op::Text(n) => format!("`line {n}/"),
            Op::Gosub => "gosub *bump".to_string(),
            Op::Loop(v, n) => format!("for %9 = 1 to {n} : add %{v}, %9 : next"),
        }
    }
}

fn op() -> impl Strategy<Value = Op> {
    let var = 0u32..6;
    prop_oneof![
        (var.clone(), -50i32..50).prop_map(|(v, n)| Op::Mov(v, n)),
        (var.clone(), -50i32..50).prop_map(|(v, n)| Op::Add(v, n)),
        (var.clone(), -3i32..4).prop_map(|(v, n)| Op::Mul(v, n)),
        (var.clone(), 1i32..1000).prop_map(|(v, n)| Op::Rnd(v, n)),
        any::<u8>().prop_map(Op::Text),
        Just(Op::Gosub),
        (var, 1i32..5).prop_map(|(v, n)| Op::Loop(v, n)),
    ]
}

fn script(ops: &[Op]) -> String {
    let mut source = String::from("*start\n");
    for op in ops {
        source.push_str(&op.line());
        source.push('\n');
    }
    source.push_str("end\n*bump\ninc %7\nreturn\n");
    source
}

fn engine(source: &str) -> Engine {
    Engine::new(
        Script::parse(source),
        EngineConfig::default().with_seed(7),
        Box::new(RecordingHost::new()),
        Box::new(TraceSource::default()),
    )
    .unwrap()
}

fn registers(engine: &Engine) -> Vec<i32> {
    (0..10).map(|i| engine.state().vars.num(i).unwrap()).collect()
}

proptest! {
    #[test]
    fn restored_session_finishes_like_the_original(
        ops in prop::collection::vec(op(), 1..24),
        split in 0usize..40,
    ) {
        let source = script(&ops);
        let mut original = engine(&source);
        for _ in 0..split {
            if original.loop_state() == LoopState::Terminated {
                break;
            }
            original.step().unwrap();
        }
        if original.loop_state() == LoopState::Terminated {
            return Ok(());
        }
        let bytes = original.persist(original.state().cursor).unwrap();
        original.run().unwrap();

        let mut restored = engine(&source);
        restored.restore(&bytes).unwrap();
        restored.run().unwrap();

        prop_assert_eq!(registers(&restored), registers(&original));
        prop_assert_eq!(restored.state().pages.current(), original.state().pages.current());
        prop_assert_eq!(restored.state().rng.draws(), original.state().rng.draws());
    }

    #[test]
    fn any_truncation_is_rejected_without_change(cut in 0usize..64) {
        let source = "*start\nmov %0, 3\nmov %1, 4\n";
        let mut donor = engine(source);
        donor.step().unwrap();
        let bytes = donor.persist(donor.state().cursor).unwrap();
        let cut = cut.min(bytes.len() - 1);

        let mut target = engine(source);
        prop_assert!(target.restore(&bytes[..cut]).is_err());
        prop_assert_eq!(target.state().cursor.line, 1);
        prop_assert_eq!(target.state().vars.num(0).unwrap(), 0);
    }
}
