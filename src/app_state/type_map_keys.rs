use serenity::prelude::TypeMapKey;

use super::AppState;

pub(crate) struct AppStateKey;

impl TypeMapKey for AppStateKey {
    type Value = AppState;
}
