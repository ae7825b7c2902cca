#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

impl Key {
    /// Parse a DOM-style key name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "ArrowLeft" | "Left" => Key::ArrowLeft,
            "ArrowRight" | "Right" => Key::ArrowRight,
            "Escape" | "Esc" => Key::Escape,
            _ => Key::Other,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key(Key),
    /// Pointer or touch press at `x` on a display area `width` wide.
    Press { x: f32, width: f32 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Navigation {
    Previous,
    Next,
    Close,
}

impl InputEvent {
    /// Navigation this input maps to.  Presses in the middle third of the
    /// display do nothing.
    pub fn navigation(&self) -> Option<Navigation> {
        match *self {
            InputEvent::Key(Key::ArrowLeft) => Some(Navigation::Previous),
            InputEvent::Key(Key::ArrowRight) => Some(Navigation::Next),
            InputEvent::Key(Key::Escape) => Some(Navigation::Close),
            InputEvent::Key(Key::Other) => None,
            InputEvent::Press { x, width } => {
                if width.is_nan() || width <= 0.0 || !(0.0..=width).contains(&x) {
                    return None;
                }
                let third = width / 3.0;
                if x < third {
                    Some(Navigation::Previous)
                } else if x >= width - third {
                    Some(Navigation::Next)
                } else {
                    None
                }
            }
        }
    }
}
