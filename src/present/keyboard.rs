#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    ArrowRight,
    ArrowLeft,
    ArrowDown,
    ArrowUp,
    Space,
    PageDown,
    PageUp,
    M,
    P,
    D,
    E,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyModifiers {
    pub ctrl: bool,
    pub shift: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    pub fn plain(key: KeyCode) -> Self {
        Self {
            key,
            modifiers: KeyModifiers::default(),
        }
    }
}

/// Local commands of the source window. Only navigation reaches the wire,
/// and only indirectly through the resulting `slide` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCommand {
    Next,
    Prev,
    ToggleMenu,
    TogglePresenter,
    ToggleDrawing,
    ToggleEraser,
    ExitFullscreen,
}

pub fn map_key_event_to_command(event: KeyEvent) -> Option<SourceCommand> {
    if event.modifiers.ctrl {
        return None;
    }
    match event.key {
        KeyCode::ArrowRight | KeyCode::ArrowDown | KeyCode::PageDown => Some(SourceCommand::Next),
        KeyCode::Space if event.modifiers.shift => Some(SourceCommand::Prev),
        KeyCode::Space => Some(SourceCommand::Next),
        KeyCode::ArrowLeft | KeyCode::ArrowUp | KeyCode::PageUp => Some(SourceCommand::Prev),
        KeyCode::M => Some(SourceCommand::ToggleMenu),
        KeyCode::P => Some(SourceCommand::TogglePresenter),
        KeyCode::D => Some(SourceCommand::ToggleDrawing),
        KeyCode::E => Some(SourceCommand::ToggleEraser),
        KeyCode::Escape => Some(SourceCommand::ExitFullscreen),
        KeyCode::Other => None,
    }
}
