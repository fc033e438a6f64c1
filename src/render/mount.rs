// ============================================================================
// spark-fiber - Mounted Roots
// Binding a component tree to a host container
// ============================================================================

use std::rc::Rc;

use crate::commit::effects::flush_passive;
use crate::core::config::RuntimeConfig;
use crate::core::error::{RenderError, Result};
use crate::host::{HostHandle, HostTree};
use crate::reactivity::scheduling::flush_microtasks_with_limit;
use crate::scheduler::deadline::{Deadline, NeverYield};
use crate::scheduler::root::{RootInner, RootState, RootStatus, UpdateReason, WorkStats};
use crate::scheduler::work_loop::{WorkStatus, perform_work, teardown};
use crate::tree::element::{Component, Props, component};
use crate::tree::node::{Node, NodeTree};

/// Mount `def` into `container` and render it synchronously.
///
/// Passive effects of the first commit have run by the time this returns.
///
/// # Example
///
/// ```
/// use spark_fiber::{Component, MemoryHost, Props, h, mount};
///
/// let app = Component::new("App", |cx| {
///     let title = cx.props().str("title").unwrap_or_default().to_string();
///     Ok(h("h1").child(title).into())
/// });
///
/// let host = MemoryHost::new();
/// let container = host.create_container();
/// let mut root = mount(&app, Props::new().with("title", "Inbox"), host.clone(), container).unwrap();
/// assert_eq!(host.to_html(container), "<h1>Inbox</h1>");
///
/// root.render(Props::new().with("title", "Archive")).unwrap();
/// assert_eq!(host.to_html(container), "<h1>Archive</h1>");
///
/// root.unmount().unwrap();
/// assert_eq!(host.to_html(container), "");
/// ```
pub fn mount<H>(def: &Component, props: Props, host: H, container: HostHandle) -> Result<Root>
where
    H: HostTree + 'static,
{
    mount_with_config(def, props, host, container, RuntimeConfig::default())
}

/// [`mount`] with explicit runtime settings.
pub fn mount_with_config<H>(
    def: &Component,
    props: Props,
    host: H,
    container: HostHandle,
    config: RuntimeConfig,
) -> Result<Root>
where
    H: HostTree + 'static,
{
    config.validate()?;
    tracing::debug!(component = def.name(), %container, "mounting");

    let mut tree = NodeTree::new();
    let root_id = tree.insert(Node::root(container));
    let state = RootState::new(tree, root_id, container);
    let mut root = Root {
        inner: RootInner::new(state, Box::new(host), config),
        component: def.clone(),
    };
    root.render(props)?;
    Ok(root)
}

/// Handle to a mounted tree. Dropping it unmounts the tree.
pub struct Root {
    inner: Rc<RootInner>,
    component: Component,
}

impl Root {
    /// Render the root component again with new props, synchronously.
    pub fn render(&mut self, props: Props) -> Result<()> {
        self.check_open()?;
        let _driving = self.inner.drive();
        let root_id = {
            let mut state = self.inner.state.borrow_mut();
            let root_id = state.root;
            if let Some(node) = state.tree.get_mut(root_id) {
                node.children = vec![component(&self.component, props).into()];
            }
            root_id
        };
        self.inner.request_update(root_id, UpdateReason::State);
        self.run_to_completion()
    }

    /// Delete the whole tree, running every cleanup. Further work on this
    /// root returns [`RenderError::Unmounted`]. Calling it twice is a no-op.
    pub fn unmount(&mut self) -> Result<()> {
        if self.inner.status() == RootStatus::Unmounted {
            return Ok(());
        }
        tracing::debug!(component = self.component.name(), "unmounting");
        let _driving = self.inner.drive();
        let result = teardown(&self.inner);
        self.inner.passive.borrow_mut().clear();
        if let Ok(mut state) = self.inner.state.try_borrow_mut() {
            state.status = RootStatus::Unmounted;
        }
        result
    }

    /// Render dirty subtrees until `deadline` asks to yield, committing
    /// when the worklist drains. Does not reschedule itself; call again
    /// while [`has_pending_work`](Self::has_pending_work) is true.
    pub fn perform_work(&mut self, deadline: &dyn Deadline) -> Result<WorkStatus> {
        perform_work(&self.inner, deadline)
    }

    /// Run work, microtasks and passive effects until nothing is pending.
    ///
    /// Fails with [`RenderError::CommitLoop`] when effects keep requesting
    /// updates for more than `max_commit_passes` passes.
    pub fn flush_sync(&mut self) -> Result<()> {
        self.check_open()?;
        let _driving = self.inner.drive();
        self.run_to_completion()
    }

    fn run_to_completion(&self) -> Result<()> {
        let config = &self.inner.config;
        for _ in 0..config.max_commit_passes {
            perform_work(&self.inner, &NeverYield)?;
            flush_microtasks_with_limit(config.max_microtask_iterations);
            flush_passive(&self.inner);
            if !self.inner.has_pending_work() {
                return Ok(());
            }
        }
        tracing::warn!(passes = config.max_commit_passes, "updates kept scheduling");
        Err(RenderError::CommitLoop {
            passes: config.max_commit_passes,
        })
    }

    fn check_open(&self) -> Result<()> {
        match self.inner.status() {
            RootStatus::Unmounted => Err(RenderError::Unmounted),
            RootStatus::Failed => Err(RenderError::RootFailed),
            _ => Ok(()),
        }
    }

    /// Called whenever the root wants to be driven, instead of queueing a
    /// time slice on the microtask queue. The callback should arrange for
    /// [`perform_work`](Self::perform_work) to be called soon.
    pub fn on_schedule(&self, f: impl Fn() + 'static) {
        *self.inner.on_schedule.borrow_mut() = Some(Rc::new(f));
    }

    pub fn has_pending_work(&self) -> bool {
        self.inner.has_pending_work()
    }

    pub fn status(&self) -> RootStatus {
        self.inner.status()
    }

    pub fn stats(&self) -> WorkStats {
        self.inner.state.borrow().stats
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn container(&self) -> HostHandle {
        self.inner.state.borrow().container
    }

    /// Live nodes in the root's arena, the root node included.
    pub fn node_count(&self) -> usize {
        self.inner.state.borrow().tree.len()
    }
}

impl Drop for Root {
    fn drop(&mut self) {
        if let Err(error) = self.unmount() {
            tracing::error!(%error, "unmount on drop failed");
        }
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("component", &self.component.name())
            .field("status", &self.status())
            .finish()
    }
}
