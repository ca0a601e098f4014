use serde::{Deserialize, Serialize};

use crate::host::Rect;

/// Index handle into a [`ButtonSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonId(pub usize);

/// Visual sub-state of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVisual {
    /// Idle.
    #[default]
    Normal,
    /// Pointer is over it.
    Hover,
    /// Being pressed.
    Pressed,
}

/// What a button is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    /// A bare rectangle over the `btndef` image (`btn`).
    Region,
    /// A loaded sprite (`spbtn`).
    Sprite(u32),
    /// A line of text (`select` choices and system-UI entries).
    Text(String),
}

/// One click-selectable region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// What it is drawn from.
    pub kind: ButtonKind,
    /// Hit rectangle.
    pub rect: Rect,
    /// Code delivered when it is chosen.
    pub value: i32,
    /// Next button of the same group.
    pub next: Option<ButtonId>,
    /// Visual sub-state.
    pub visual: ButtonVisual,
}

/// Vertical list placement for text buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Left edge of every row.
    pub x: i32,
    /// Top edge of the first row.
    pub y: i32,
    /// Row width.
    pub width: u32,
    /// Row height.
    pub row_height: u32,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            x: 40,
            y: 40,
            width: 560,
            row_height: 32,
        }
    }
}

impl ColumnLayout {
    /// Rectangle of the row at `index`.
    pub fn row(&self, index: usize) -> Rect {
        let offset = i32::try_from(index as u64 * u64::from(self.row_height)).unwrap_or(i32::MAX);
        Rect::new(self.x, self.y.saturating_add(offset), self.width, self.row_height)
    }
}

/// The active buttons. Created by choice-presenting commands, cleared when
/// the choice resolves or the page changes, sheltered whole across a system
/// call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSet {
    buttons: Vec<Button>,
    hover: Option<ButtonId>,
    image: Option<String>,
}

impl ButtonSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A linked column of text buttons, one per `(label, value)`.
    pub fn text_column<I, S>(entries: I, layout: &ColumnLayout) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: Into<String>,
    {
        let mut set = Self::new();
        let mut previous = None;
        for (index, (label, value)) in entries.into_iter().enumerate() {
            let id = set.add(ButtonKind::Text(label.into()), layout.row(index), value);
            if let Some(prev) = previous {
                set.link(prev, id);
            }
            previous = Some(id);
        }
        set
    }

    /// Add a button and return its handle.
    pub fn add(&mut self, kind: ButtonKind, rect: Rect, value: i32) -> ButtonId {
        let id = ButtonId(self.buttons.len());
        self.buttons.push(Button {
            kind,
            rect,
            value,
            next: None,
            visual: ButtonVisual::Normal,
        });
        id
    }

    /// Link `from` to `to` within a group.
    pub fn link(&mut self, from: ButtonId, to: ButtonId) {
        if to.0 >= self.buttons.len() {
            return;
        }
        if let Some(button) = self.buttons.get_mut(from.0) {
            button.next = Some(to);
        }
    }

    /// The button behind a handle.
    pub fn get(&self, id: ButtonId) -> Option<&Button> {
        self.buttons.get(id.0)
    }

    /// Buttons with their handles, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, &Button)> {
        self.buttons.iter().enumerate().map(|(i, b)| (ButtonId(i), b))
    }

    /// Follow group links starting at `start`.
    pub fn group(&self, start: ButtonId) -> impl Iterator<Item = ButtonId> + '_ {
        let mut current = self.get(start).map(|_| start);
        let mut remaining = self.buttons.len();
        std::iter::from_fn(move || {
            let id = current?;
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            current = self.get(id).and_then(|b| b.next);
            Some(id)
        })
    }

    /// Number of buttons.
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Drop every button and the hover. The `btndef` image survives.
    pub fn clear(&mut self) {
        self.buttons.clear();
        self.hover = None;
    }

    /// Drop everything, including the `btndef` image.
    pub fn reset(&mut self, image: Option<String>) {
        self.clear();
        self.image = image;
    }

    /// The `btndef` image.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// The topmost button under a point. Later buttons are on top.
    pub fn hit(&self, x: i32, y: i32) -> Option<ButtonId> {
        self.buttons
            .iter()
            .rposition(|b| b.rect.contains(x, y))
            .map(ButtonId)
    }

    /// The hovered button.
    pub fn hovered(&self) -> Option<ButtonId> {
        self.hover
    }

    /// Move the hover, updating visual sub-states. Returns the previous hover.
    pub fn set_hover(&mut self, target: Option<ButtonId>) -> Option<ButtonId> {
        let previous = self.hover;
        if let Some(b) = previous.and_then(|id| self.buttons.get_mut(id.0)) {
            b.visual = ButtonVisual::Normal;
        }
        self.hover = target.filter(|id| id.0 < self.buttons.len());
        if let Some(b) = self.hover.and_then(|id| self.buttons.get_mut(id.0)) {
            b.visual = ButtonVisual::Hover;
        }
        previous
    }

    /// The `n`-th button, 1-based, for keyboard selection.
    pub fn by_ordinal(&self, n: usize) -> Option<ButtonId> {
        n.checked_sub(1)
            .filter(|i| *i < self.buttons.len())
            .map(ButtonId)
    }
}
