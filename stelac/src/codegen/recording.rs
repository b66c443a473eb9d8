//! In-memory helper backend.
//!
//! Records every generated helper with its plan and the helpers it calls.
//! Used by `stelac helpers` and by tests that inspect instantiation.

use std::fmt::Write;

use crate::def::TypeId;
use crate::typeck::lifetime::{HandleKind, LifetimeOp, LifetimePlan};

use super::cache::{HelperBackend, HelperBody, HelperEnv};
use super::runtime::functions;
use super::CodegenError;

/// One recorded helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedHelper {
    pub name: String,
    pub op: LifetimeOp,
    pub ty: TypeId,
    /// `None` until the body has been generated.
    pub plan: Option<LifetimePlan>,
    pub calls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    helpers: Vec<RecordedHelper>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Helpers in declaration order.
    pub fn helpers(&self) -> &[RecordedHelper] {
        &self.helpers
    }

    /// One line per helper, e.g.
    /// `stela_destroy_Asint: release array via stela_array_release`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for helper in &self.helpers {
            let _ = write!(out, "{}: ", helper.name);
            match &helper.plan {
                Some(plan) => out.push_str(&describe(plan)),
                None => out.push_str("<undefined>"),
            }
            if !helper.calls.is_empty() {
                let _ = write!(out, " -> {}", helper.calls.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

fn describe(plan: &LifetimePlan) -> String {
    match plan {
        LifetimePlan::Noop => "no-op".to_string(),
        LifetimePlan::Zero { size } => format!("zero {size} bytes"),
        LifetimePlan::BitCopy { size } => format!("copy {size} bytes"),
        LifetimePlan::EmptyHandle => "store null handle".to_string(),
        LifetimePlan::Retain => format!("share block via {}", functions::RC_RETAIN),
        LifetimePlan::Transfer => "take block, clear source".to_string(),
        LifetimePlan::RetainAssign => format!("share block via {}, release old", functions::RC_RETAIN),
        LifetimePlan::TransferAssign => "release old, take block, clear source".to_string(),
        LifetimePlan::Release(HandleKind::Array { .. }) => {
            format!("release array via {}", functions::ARRAY_RELEASE)
        }
        LifetimePlan::Release(HandleKind::Closure) => {
            format!("release closure via {}", functions::CLOSURE_RELEASE)
        }
        LifetimePlan::Fields(steps) => format!("{} field(s)", steps.len()),
    }
}

impl HelperBackend for RecordingBackend {
    type Handle = usize;

    fn declare(&mut self, name: &str, op: LifetimeOp, ty: TypeId) -> Result<usize, CodegenError> {
        self.helpers.push(RecordedHelper {
            name: name.to_string(),
            op,
            ty,
            plan: None,
            calls: Vec::new(),
        });
        Ok(self.helpers.len() - 1)
    }

    fn define(&mut self, _env: &HelperEnv<'_>, body: HelperBody<'_, usize>) -> Result<(), CodegenError> {
        let calls = body
            .callees
            .iter()
            .map(|&callee| self.helpers[callee].name.clone())
            .collect();
        let helper = self
            .helpers
            .get_mut(*body.handle)
            .ok_or_else(|| CodegenError::UnknownHelper(*body.handle))?;
        helper.plan = Some(body.plan.clone());
        helper.calls = calls;
        Ok(())
    }
}
