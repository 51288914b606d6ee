use crossterm::event::{Event, KeyCode, KeyEventKind};

/// The key code of a key press, ignoring releases and repeats
pub(super) fn event_keycode(event: &Event) -> Option<KeyCode> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(key.code),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyEvent, KeyEventState, KeyModifiers};

    use super::*;

    #[test]
    fn only_presses() {
        let press = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert_eq!(event_keycode(&press), Some(KeyCode::Char('q')));

        let release = Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(event_keycode(&release), None);
        assert_eq!(event_keycode(&Event::FocusGained), None);
    }
}
