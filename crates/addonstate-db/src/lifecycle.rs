use addonstate_core::AddonRecord;
use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::warn;

/// Host callbacks fired on package state transitions.
#[async_trait]
pub trait LifecycleNotifier: Send + Sync {
    fn install(&self, record: &AddonRecord);

    fn uninstall(&self, record: &AddonRecord);

    async fn update(
        &self,
        old: &AddonRecord,
        new: &AddonRecord,
        restart: bool,
    ) -> anyhow::Result<()>;

    async fn enable(&self, record: &AddonRecord) -> anyhow::Result<()>;

    async fn disable(&self, record: &AddonRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFailure {
    pub id: String,
    pub hook: &'static str,
    pub message: String,
}

#[derive(Debug, Clone)]
pub(crate) enum HookCall {
    Update {
        old: Box<AddonRecord>,
        new: Box<AddonRecord>,
        restart: bool,
    },
    Enable(Box<AddonRecord>),
    Disable(Box<AddonRecord>),
}

impl HookCall {
    fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Enable(_) => "enable",
            Self::Disable(_) => "disable",
        }
    }

    async fn run(&self, notifier: &dyn LifecycleNotifier) -> anyhow::Result<()> {
        match self {
            Self::Update { old, new, restart } => notifier.update(old, new, *restart).await,
            Self::Enable(record) => notifier.enable(record).await,
            Self::Disable(record) => notifier.disable(record).await,
        }
    }
}

/// Ordered hook calls for one package.
#[derive(Debug, Clone)]
pub(crate) struct HookPlan {
    pub id: String,
    pub calls: Vec<HookCall>,
}

impl HookPlan {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            calls: Vec::new(),
        }
    }

    pub fn push(&mut self, call: HookCall) {
        self.calls.push(call);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Runs every plan concurrently. Calls within a plan run in order and a
/// failing call does not stop the ones after it.
pub(crate) async fn run_hook_plans(
    notifier: &dyn LifecycleNotifier,
    plans: Vec<HookPlan>,
) -> Vec<HookFailure> {
    let runs = plans.iter().map(|plan| async move {
        let mut failures = Vec::new();
        for call in &plan.calls {
            if let Err(err) = call.run(notifier).await {
                warn!(
                    id = %plan.id,
                    hook = call.name(),
                    error = %format!("{err:#}"),
                    "lifecycle hook failed"
                );
                failures.push(HookFailure {
                    id: plan.id.clone(),
                    hook: call.name(),
                    message: format!("{err:#}"),
                });
            }
        }
        failures
    });

    join_all(runs).await.into_iter().flatten().collect()
}
