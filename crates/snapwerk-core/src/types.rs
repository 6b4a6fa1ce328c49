// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Snapwerk image service.

use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

/// Action list applied when a request does not name one.
pub const DEFAULT_ACTIONS: &str = "gray,equalize,denoise";

/// Unique identifier for an incoming HTTP request (used in log spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single named transform recognised by the action pipeline.
///
/// Declaration order is evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Reduce to a single luma channel.
    Gray,
    /// Global histogram equalization.
    Equalize,
    /// Non-local-means denoising.
    Denoise,
    /// Contrast-limited adaptive histogram equalization.
    Clahe,
    /// 3x3 Gaussian smoothing.
    Blur,
    /// Locate faces and outline them with dashed boxes.
    Faces,
}

impl Action {
    /// Every recognised action, in evaluation order.
    pub const ALL: [Action; 6] = [
        Action::Gray,
        Action::Equalize,
        Action::Denoise,
        Action::Clahe,
        Action::Blur,
        Action::Faces,
    ];

    /// The lowercase token used in query strings.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Equalize => "equalize",
            Self::Denoise => "denoise",
            Self::Clahe => "clahe",
            Self::Blur => "blur",
            Self::Faces => "faces",
        }
    }

    /// Look up an action by token. Matching ignores ASCII case and
    /// surrounding whitespace; anything else yields `None`.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.token().eq_ignore_ascii_case(token))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// The set of actions selected by a request.
///
/// Membership is all that matters: however the tokens were ordered or
/// repeated, the selected actions run once each, in the canonical order
/// `gray, equalize, denoise, clahe, blur, faces`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionList(Vec<Action>);

impl ActionList {
    /// Parse a comma-separated token list. Unknown and empty tokens are
    /// dropped without error.
    pub fn parse(text: &str) -> Self {
        let mut actions: Vec<Action> = text
            .split(',')
            .filter_map(|token| {
                let action = Action::from_token(token);
                if action.is_none() && !token.trim().is_empty() {
                    trace!(token = token.trim(), "ignoring unrecognised action");
                }
                action
            })
            .collect();
        actions.sort_unstable();
        actions.dedup();
        Self(actions)
    }

    /// Selected actions in evaluation order.
    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for ActionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens: Vec<&str> = self.0.iter().map(Action::token).collect();
        f.write_str(&tokens.join(","))
    }
}

/// Sample order of a three-channel raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Axis-aligned face region in pixel space (top-left origin).
///
/// `top < bottom <= height` and `left < right <= width`; `right` and `bottom`
/// are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    /// Build a box from a detector rectangle (`x`, `y`, `w`, `h`), clipped to
    /// a `width` x `height` image. Returns `None` when nothing of the
    /// rectangle remains inside the image.
    pub fn clamped(x: i64, y: i64, w: i64, h: i64, width: u32, height: u32) -> Option<Self> {
        let left = x.clamp(0, width as i64);
        let top = y.clamp(0, height as i64);
        let right = x.saturating_add(w).clamp(0, width as i64);
        let bottom = y.saturating_add(h).clamp(0, height as i64);
        if left >= right || top >= bottom {
            return None;
        }
        Some(Self {
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
            left: left as u32,
        })
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Corner pair used for outline drawing: `(left, top)` and
    /// `(right, bottom)`, so each outline edge is as long as the box side.
    pub fn corners(&self) -> ((i32, i32), (i32, i32)) {
        (
            (self.left as i32, self.top as i32),
            (self.right as i32, self.bottom as i32),
        )
    }
}

/// One encoded result, moved into the archive builder once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedItem {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ProcessedItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// HTTP server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uses_canonical_order_and_drops_repeats() {
        let list = ActionList::parse("faces,blur,gray,blur");
        assert_eq!(
            list.actions(),
            &[Action::Gray, Action::Blur, Action::Faces]
        );
        assert_eq!(list.to_string(), "gray,blur,faces");
        assert_eq!(list, ActionList::parse("gray,blur,faces"));
    }

    #[test]
    fn parse_drops_unknown_tokens() {
        let list = ActionList::parse("gray,sharpen,,faces,GRAYSCALE");
        assert_eq!(list.actions(), &[Action::Gray, Action::Faces]);
    }

    #[test]
    fn parse_trims_and_ignores_case() {
        let list = ActionList::parse(" CLAHE , Gray ");
        assert_eq!(list.actions(), &[Action::Gray, Action::Clahe]);
    }

    #[test]
    fn parse_only_unknown_is_empty() {
        assert!(ActionList::parse("foo,bar").is_empty());
        assert!(ActionList::parse("").is_empty());
    }

    #[test]
    fn default_actions_parse() {
        let list = ActionList::parse(DEFAULT_ACTIONS);
        assert_eq!(
            list.actions(),
            &[Action::Gray, Action::Equalize, Action::Denoise]
        );
        assert_eq!(list.to_string(), DEFAULT_ACTIONS);
    }

    #[test]
    fn every_token_round_trips() {
        for action in Action::ALL {
            assert_eq!(Action::from_token(action.token()), Some(action));
        }
    }

    #[test]
    fn face_box_clamps_to_image() {
        let b = FaceBox::clamped(-5, 10, 50, 200, 40, 100).expect("box inside image");
        assert_eq!(
            b,
            FaceBox {
                top: 10,
                right: 40,
                bottom: 100,
                left: 0
            }
        );
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 90);
    }

    #[test]
    fn face_box_outside_image_is_rejected() {
        assert!(FaceBox::clamped(100, 100, 10, 10, 50, 50).is_none());
        assert!(FaceBox::clamped(5, 5, 0, 10, 50, 50).is_none());
    }

    #[test]
    fn face_box_corners_span_the_full_sides() {
        let b = FaceBox {
            top: 2,
            right: 12,
            bottom: 22,
            left: 3,
        };
        assert_eq!(b.corners(), ((3, 2), (12, 22)));
    }
}
