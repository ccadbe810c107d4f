//! Host environment signals: appearance and window size.
//!
//! The host pushes new values into a [`Signal`]; views subscribe and must
//! drop or remove their [`Subscription`] on teardown.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, trace};

const HORIZONTAL_PADDING: u32 = 30;
const MIN_CELL_SIZE: u32 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub text: &'static str,
    pub primary: &'static str,
    pub today_background: &'static str,
    pub outside_month_text: &'static str,
    pub reminder_dot: &'static str,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        let dark = theme == Theme::Dark;
        let pick = |d: &'static str, l: &'static str| if dark { d } else { l };
        Self {
            text: pick("#e0e0e0", "#333333"),
            primary: "#1890ff",
            today_background: pick("#163e59", "#e6f7ff"),
            outside_month_text: pick("#555555", "#999999"),
            reminder_dot: "#f5222d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 390,
            height: 844,
        }
    }
}

impl WindowSize {
    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn cell_metrics(&self) -> CellMetrics {
        CellMetrics::for_width(self.width)
    }
}

/// Square day-cell size: `max(floor((width - 30) / 7) - 4, 36)`.
pub fn day_cell_size(window_width: u32) -> u32 {
    let available = window_width.saturating_sub(HORIZONTAL_PADDING);
    (available / 7).saturating_sub(4).max(MIN_CELL_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CellMetrics {
    pub width: u32,
    pub height: u32,
    pub font_size: f32,
}

impl CellMetrics {
    pub fn for_width(window_width: u32) -> Self {
        let size = day_cell_size(window_width);
        Self {
            width: size,
            height: size,
            font_size: size as f32 * 0.4,
        }
    }
}

type Listener<T> = Box<dyn FnMut(&T)>;

struct SignalInner<T> {
    value: T,
    next_id: u64,
    listeners: BTreeMap<u64, Listener<T>>,
    // Ids removed while their listener was checked out by `set`.
    detached: Vec<u64>,
}

/// Single-threaded observable value supplied by the host.
pub struct Signal<T> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                value,
                next_id: 0,
                listeners: BTreeMap::new(),
                detached: Vec::new(),
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, Box::new(listener));
        trace!(id, "signal subscriber added");

        let weak: Weak<RefCell<SignalInner<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.borrow_mut();
                    if inner.listeners.remove(&id).is_none() {
                        inner.detached.push(id);
                    }
                    trace!(id, "signal subscriber removed");
                }
            })),
        }
    }

    /// Stores `value` and notifies subscribers if it changed.
    pub fn set(&self, value: T) {
        let mut listeners = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            debug!(?value, "host signal changed");
            inner.value = value.clone();
            std::mem::take(&mut inner.listeners)
        };

        for listener in listeners.values_mut() {
            listener(&value);
        }

        // Listeners may subscribe or unsubscribe while being notified.
        let mut inner = self.inner.borrow_mut();
        let detached = std::mem::take(&mut inner.detached);
        for (id, listener) in listeners {
            if !detached.contains(&id) {
                inner.listeners.entry(id).or_insert(listener);
            }
        }
    }
}

/// Handle returned by [`Signal::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn remove(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Appearance and window signals handed to a view.
#[derive(Clone)]
pub struct HostEnvironment {
    pub theme: Signal<Theme>,
    pub window: Signal<WindowSize>,
}

impl HostEnvironment {
    pub fn new(theme: Theme, window: WindowSize) -> Self {
        Self {
            theme: Signal::new(theme),
            window: Signal::new(window),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn cell_size_formula() {
        assert_eq!(day_cell_size(390), 47);
        assert_eq!(day_cell_size(200), 36);
        assert_eq!(day_cell_size(0), 36);
        assert_eq!(day_cell_size(844), 112);
        let metrics = CellMetrics::for_width(390);
        assert!((metrics.font_size - 18.8).abs() < 1e-4);
    }

    #[test]
    fn orientation_from_dimensions() {
        let portrait = WindowSize::default();
        assert_eq!(portrait.orientation(), Orientation::Portrait);
        let landscape = WindowSize {
            width: 844,
            height: 390,
        };
        assert_eq!(landscape.orientation(), Orientation::Landscape);
        let square = WindowSize {
            width: 500,
            height: 500,
        };
        assert_eq!(square.orientation(), Orientation::Portrait);
    }

    #[test]
    fn palette_switches_with_theme() {
        assert_eq!(Palette::for_theme(Theme::Dark).text, "#e0e0e0");
        assert_eq!(Palette::for_theme(Theme::Light).outside_month_text, "#999999");
        assert_eq!(Palette::for_theme(Theme::Dark).primary, "#1890ff");
    }

    #[test]
    fn subscribers_see_changes_until_removed() {
        let env = HostEnvironment::new(Theme::Light, WindowSize::default());
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let sub = env.theme.subscribe(move |_| counter.set(counter.get() + 1));

        env.theme.set(Theme::Dark);
        env.theme.set(Theme::Dark);
        assert_eq!(seen.get(), 1);
        assert_eq!(env.theme.get(), Theme::Dark);

        sub.remove();
        assert_eq!(env.theme.subscriber_count(), 0);
        env.theme.set(Theme::Light);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let signal = Signal::new(WindowSize::default());
        {
            let _sub = signal.subscribe(|_| {});
            assert_eq!(signal.subscriber_count(), 1);
        }
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal = Signal::new(Theme::Light);
        let sub = signal.subscribe(|_| {});
        drop(signal);
        sub.remove();
    }
}
