//! Status glyphs, with plain-text fallbacks for terminals without emoji.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[FAIL]");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static WATCH: Emoji<'_, '_> = Emoji("👀 ", "[WATCH]");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
