use tracing::{debug, info};

use crate::storage::{Storage, THEME_KEY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// ANSI SGR codes the renderer paints with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: &'static str,
    pub position: &'static str,
    pub checkbox: &'static str,
    pub completed: &'static str,
    pub controls: &'static str,
}

impl Theme {
    pub fn next(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn storage_value(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Self::Light => Palette {
                text: "39",
                position: "33",
                checkbox: "34",
                completed: "9;90",
                controls: "36",
            },
            Self::Dark => Palette {
                text: "97;40",
                position: "93;40",
                checkbox: "96;40",
                completed: "9;37;40",
                controls: "95;40",
            },
        }
    }
}

/// Only an exact `"dark"` selects the dark theme. Never writes.
#[tracing::instrument(skip(storage))]
pub fn load_theme<S: Storage>(storage: &S) -> anyhow::Result<Theme> {
    let stored = storage.get_item(THEME_KEY)?;
    let theme = match stored.as_deref() {
        Some("dark") => Theme::Dark,
        _ => Theme::Light,
    };
    debug!(?stored, ?theme, "loaded theme");
    Ok(theme)
}

#[tracing::instrument(skip(storage))]
pub fn toggle_dark_mode<S: Storage>(storage: &mut S, current: Theme) -> anyhow::Result<Theme> {
    let theme = current.next();
    storage.set_item(THEME_KEY, theme.storage_value())?;
    info!(theme = theme.storage_value(), "theme toggled");
    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::{Theme, load_theme, toggle_dark_mode};
    use crate::storage::{MemoryStorage, Storage, THEME_KEY};

    #[test]
    fn absent_or_unknown_value_is_light() {
        let mut storage = MemoryStorage::new();
        assert_eq!(load_theme(&storage).expect("load"), Theme::Light);

        storage.set_item(THEME_KEY, "Dark").expect("set");
        assert_eq!(load_theme(&storage).expect("load"), Theme::Light);
    }

    #[test]
    fn light_text_keeps_terminal_foreground() {
        assert_eq!(Theme::Light.palette().text, "39");
    }

    #[test]
    fn loading_does_not_write() {
        let storage = MemoryStorage::new();
        load_theme(&storage).expect("load");
        assert_eq!(storage.get_item(THEME_KEY).expect("get"), None);
    }

    #[test]
    fn toggle_persists_each_value() {
        let mut storage = MemoryStorage::new();
        let theme = toggle_dark_mode(&mut storage, Theme::Light).expect("toggle");
        assert_eq!(theme, Theme::Dark);
        assert_eq!(
            storage.get_item(THEME_KEY).expect("get").as_deref(),
            Some("dark")
        );
        assert_eq!(load_theme(&storage).expect("load"), Theme::Dark);

        let theme = toggle_dark_mode(&mut storage, theme).expect("toggle");
        assert_eq!(theme, Theme::Light);
        assert_eq!(
            storage.get_item(THEME_KEY).expect("get").as_deref(),
            Some("light")
        );
    }
}
