use super::scripts;
use crate::portal::ClickMode;
use crate::{Error, Result};
use changetracker_core::config::Coordinates;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::dom::{
    BackendNodeId, DescribeNodeParams, GetBoxModelParams,
};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::layout::Point;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::{Instant, sleep};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// An element (or a set of siblings) addressed inside a frame's document
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Target {
    Css { selector: String, nth: i64 },
    Role { role: String, nth: i64 },
    /// A control inside the list row with the given position attribute
    RowControl {
        row: String,
        index: u32,
        control: String,
    },
}

impl Target {
    pub fn css(selector: impl Into<String>) -> Self {
        Target::Css {
            selector: selector.into(),
            nth: 0,
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Target::Role {
            role: role.into(),
            nth: 0,
        }
    }

    pub fn row_control(row: &str, index: u32, control: &str) -> Self {
        Target::RowControl {
            row: row.to_string(),
            index,
            control: control.to_string(),
        }
    }

    /// The nth match, counted from zero
    pub fn nth(self, n: usize) -> Self {
        self.with_nth(n as i64)
    }

    /// The last match
    pub fn last(self) -> Self {
        self.with_nth(-1)
    }

    fn with_nth(self, n: i64) -> Self {
        match self {
            Target::Css { selector, .. } => Target::Css { selector, nth: n },
            Target::Role { role, .. } => Target::Role { role, nth: n },
            other => other,
        }
    }

    fn describe(&self) -> String {
        match self {
            Target::Css { selector, nth } => format!("{} (#{})", selector, nth),
            Target::Role { role, nth } => format!("role={} (#{})", role, nth),
            Target::RowControl {
                row,
                index,
                control,
            } => format!("{} in row {} ({})", control, index, row),
        }
    }
}

/// Element states a wait can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Attached,
    Detached,
    Visible,
    /// Not visible, or not attached at all
    Hidden,
    /// Any match, not just the addressed one, is visible
    AnyVisible,
}

/// Snapshot of a target as seen by the page
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub count: usize,
    pub found: bool,
    pub visible: bool,
    pub enabled: bool,
    pub any_visible: bool,
}

impl Probe {
    pub fn satisfies(&self, state: WaitState) -> bool {
        match state {
            WaitState::Attached => self.found,
            WaitState::Detached => !self.found,
            WaitState::Visible => self.visible,
            WaitState::Hidden => !self.visible,
            WaitState::AnyVisible => self.any_visible,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClickPoint {
    x: f64,
    y: f64,
    visible: bool,
    enabled: bool,
    receives: bool,
}

/// One frame of a page, driven through the DevTools protocol
///
/// Scripts run in the frame's own execution context. Frames embedded in the
/// top document remember their owning `<iframe>` so pointer clicks can be
/// translated into page coordinates.
#[derive(Clone)]
pub struct CdpFrame {
    page: Page,
    frame_id: FrameId,
    owner: Option<BackendNodeId>,
}

impl CdpFrame {
    /// The page's top-level frame
    pub async fn main(page: &Page) -> Result<Self> {
        let frame_id = page
            .mainframe()
            .await?
            .ok_or_else(|| Error::FrameUnavailable("page has no main frame".to_string()))?;
        Ok(Self {
            page: page.clone(),
            frame_id,
            owner: None,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Frames owned by `<iframe>` elements matching `selector` in the top document
    pub async fn child_frames(&self, selector: &str) -> Result<Vec<CdpFrame>> {
        let mut frames = Vec::new();
        for element in self.page.find_elements(selector).await? {
            let mut params = DescribeNodeParams::default();
            params.backend_node_id = Some(element.backend_node_id.clone());
            let node = self.page.execute(params).await?.result.node;

            match node.frame_id {
                Some(frame_id) => frames.push(CdpFrame {
                    page: self.page.clone(),
                    frame_id,
                    owner: Some(element.backend_node_id.clone()),
                }),
                None => tracing::trace!("{} matched an element without a content frame", selector),
            }
        }
        Ok(frames)
    }

    /// Whether the frame has left the page's frame tree
    pub async fn is_detached(&self) -> bool {
        match self.page.frames().await {
            Ok(frames) => !frames.contains(&self.frame_id),
            Err(_) => true,
        }
    }

    /// Evaluate an expression in this frame and decode its value
    pub async fn evaluate<T: DeserializeOwned>(&self, expression: String) -> Result<T> {
        let context = self
            .page
            .frame_execution_context(self.frame_id.clone())
            .await?
            .ok_or(Error::FrameDetached)?;

        let params = EvaluateParams::builder()
            .expression(expression)
            .context_id(context)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(Error::Cdp)?;

        let response = self.page.execute(params).await?;
        if let Some(exception) = &response.result.exception_details {
            return Err(Error::Script(exception.text.clone()));
        }
        let value = response.result.result.value.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Run one of the [`scripts`] bodies with arguments
    pub async fn run<T, A>(&self, body: &str, args: &A) -> Result<T>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        self.evaluate(scripts::call(body, args)?).await
    }

    pub async fn probe(&self, target: &Target) -> Result<Probe> {
        self.run(scripts::PROBE, &json!({ "target": target })).await
    }

    pub async fn attribute(&self, target: &Target, name: &str) -> Result<Option<String>> {
        self.run(scripts::ATTRIBUTE, &json!({ "target": target, "name": name }))
            .await
    }

    /// Accessible names of every match
    pub async fn names(&self, target: &Target) -> Result<Vec<String>> {
        self.run(scripts::NAMES, &json!({ "target": target })).await
    }

    /// Inner text of every match
    pub async fn texts(&self, target: &Target) -> Result<Vec<String>> {
        self.run(scripts::TEXTS, &json!({ "target": target })).await
    }

    /// Wait for the target to reach a state
    ///
    /// Script failures while polling (a context not created yet, a frame
    /// being swapped) count as "not yet".
    pub async fn wait_for(&self, target: &Target, state: WaitState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.probe(target).await {
                Ok(probe) if probe.satisfies(state) => return Ok(()),
                Ok(_) => {}
                Err(e) => tracing::trace!("Probe of {} failed: {}", target.describe(), e),
            }
            if Instant::now() >= deadline {
                return Err(timed_out(
                    format!("{} to be {:?}", target.describe(), state),
                    timeout,
                ));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until a probe predicate holds
    pub async fn wait_for_probe<F>(
        &self,
        target: &Target,
        timeout: Duration,
        predicate: F,
    ) -> Result<()>
    where
        F: Fn(&Probe) -> bool + Send,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(probe) = self.probe(target).await {
                if predicate(&probe) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(timed_out(target.describe(), timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the frame's document has finished parsing
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_detached().await {
                return Err(Error::FrameDetached);
            }
            if let Ok(state) = self.run::<String, _>(scripts::READY_STATE, &json!({})).await {
                if state != "loading" {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(timed_out("document to load".to_string(), timeout));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the target
    ///
    /// A normal click waits until the element is visible, enabled and would
    /// receive a pointer event at its center, then clicks there with the
    /// mouse. A forced click calls the element's `click()` directly.
    pub async fn click(&self, target: &Target, mode: ClickMode, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let args = json!({ "target": target });
        let mut intercepted = false;

        loop {
            match mode {
                ClickMode::Normal => {
                    match self.run::<Option<ClickPoint>, _>(scripts::CLICK_POINT, &args).await {
                        Ok(Some(p)) if p.visible && p.enabled && p.receives => {
                            let (dx, dy) = self.origin().await?;
                            self.page.click(Point::new(p.x + dx, p.y + dy)).await?;
                            return Ok(());
                        }
                        Ok(Some(p)) => intercepted = p.visible && p.enabled,
                        Ok(None) => intercepted = false,
                        Err(e) => tracing::trace!("Click probe failed: {}", e),
                    }
                }
                ClickMode::Force => {
                    if let Ok(true) = self.run::<bool, _>(scripts::DOM_CLICK, &args).await {
                        return Ok(());
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(if intercepted {
                    Error::Intercepted(target.describe())
                } else {
                    timed_out(format!("{} to be clickable", target.describe()), timeout)
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Mouse click at a point of the top-level viewport
    pub async fn click_at(&self, point: Coordinates) -> Result<()> {
        self.page.click(Point::new(point.x, point.y)).await?;
        Ok(())
    }

    pub async fn press_escape(&self) -> Result<()> {
        for kind in [DispatchKeyEventType::KeyDown, DispatchKeyEventType::KeyUp] {
            let params = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key("Escape")
                .code("Escape")
                .windows_virtual_key_code(27)
                .native_virtual_key_code(27)
                .build()
                .map_err(Error::Cdp)?;
            self.page.execute(params).await?;
        }
        Ok(())
    }

    /// Top-left corner of this frame's content box in page coordinates
    async fn origin(&self) -> Result<(f64, f64)> {
        let Some(owner) = &self.owner else {
            return Ok((0.0, 0.0));
        };
        let mut params = GetBoxModelParams::default();
        params.backend_node_id = Some(owner.clone());
        let model = self.page.execute(params).await?.result.model;
        let quad = model.content.inner();
        Ok((
            quad.first().copied().unwrap_or(0.0),
            quad.get(1).copied().unwrap_or(0.0),
        ))
    }
}

fn timed_out(what: String, timeout: Duration) -> Error {
    Error::Timeout {
        what,
        timeout_ms: timeout.as_millis() as u64,
    }
}
