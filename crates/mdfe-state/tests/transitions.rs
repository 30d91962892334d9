//! Property tests: arbitrary operation sequences with injected gateway
//! failures never move a manifest backwards and never change it on error.

mod common;

use chrono::NaiveDate;
use mdfe_gateway::{GatewayOperation, TransmissionBatch};
use mdfe_state::{Closure, LifecycleError, LifecycleEvent, ManifestState};
use proptest::prelude::*;

use common::{draft, lifecycle};

#[derive(Debug, Clone, Copy)]
enum Op {
    Sign,
    Transmit,
    Poll,
    Cancel,
    Close,
}

impl Op {
    fn event(self) -> LifecycleEvent {
        match self {
            Op::Sign => LifecycleEvent::Sign,
            Op::Transmit => LifecycleEvent::Transmit,
            Op::Poll => LifecycleEvent::PollStatus,
            Op::Cancel => LifecycleEvent::Cancel,
            Op::Close => LifecycleEvent::Close,
        }
    }

    fn gateway_operation(self) -> GatewayOperation {
        match self {
            Op::Sign => GatewayOperation::Sign,
            Op::Transmit => GatewayOperation::Send,
            Op::Poll => GatewayOperation::QueryByReceipt,
            Op::Cancel => GatewayOperation::Cancel,
            Op::Close => GatewayOperation::Close,
        }
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Sign),
        Just(Op::Transmit),
        Just(Op::Poll),
        Just(Op::Cancel),
        Just(Op::Close),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn state_only_moves_forward(steps in prop::collection::vec((arb_op(), any::<bool>()), 1..12)) {
        let (lc, handle) = lifecycle();
        let mut doc = draft();
        let closure = Closure {
            municipality_code: "4106902".into(),
            closed_on: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        };

        for (i, (op, fail)) in steps.into_iter().enumerate() {
            let before = doc.state();
            let logged = doc.transitions().len();
            let allowed = op.event().required_state() == before;
            if fail && allowed {
                handle.fail_next(op.gateway_operation(), 9, "injected");
            }

            let batch = TransmissionBatch::new(i as u64 + 1).unwrap();
            let result = match op {
                Op::Sign => lc.sign(&mut doc).map(|_| ()),
                Op::Transmit => lc.transmit(&mut doc, batch).map(|_| ()),
                Op::Poll => lc.poll_status(&mut doc).map(|_| ()),
                Op::Cancel => lc.cancel(&mut doc, "Erro na digitacao dos dados", batch),
                Op::Close => lc.close(&mut doc, &closure),
            };

            match result {
                Ok(()) => {
                    prop_assert!(allowed);
                    prop_assert!(!(fail && allowed));
                    prop_assert!(doc.state().rank() > before.rank());
                    prop_assert_eq!(doc.transitions().len(), logged + 1);
                }
                Err(e) => {
                    if !allowed {
                        let invalid = matches!(e, LifecycleError::InvalidTransition { .. });
                        prop_assert!(invalid);
                    } else {
                        prop_assert!(fail);
                        let gateway = matches!(e, LifecycleError::Gateway { code: 9, .. });
                        prop_assert!(gateway);
                    }
                    prop_assert_eq!(doc.state(), before);
                    prop_assert_eq!(doc.transitions().len(), logged);
                }
            }
        }

        if doc.state() == ManifestState::Draft {
            prop_assert!(doc.access_key().is_none());
        } else {
            prop_assert!(doc.access_key().is_some());
        }
    }
}
