//! Built-in development board catalog.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref BOARDS: HashMap<String, BoardProfile> = {
        let mut boards = HashMap::new();

        boards.insert(
            "basys3".to_string(),
            BoardProfile::new(
                "Basys 3".to_string(),
                "xc7a35tcpg236-1".to_string(),
                "W5".to_string(),
                10.0,
                "Digilent Basys 3 (Artix-7 35T). Entry-level trainer board with switches, LEDs and 7-segment displays.".to_string(),
            ),
        );

        boards.insert(
            "nexys_a7".to_string(),
            BoardProfile::new(
                "Nexys A7".to_string(),
                "xc7a100tcsg324-1".to_string(),
                "E3".to_string(),
                10.0,
                "Digilent Nexys A7-100T (Artix-7 100T). Larger trainer board with DDR2 and Ethernet.".to_string(),
            ),
        );

        boards.insert(
            "arty_a7".to_string(),
            BoardProfile::new(
                "Arty A7".to_string(),
                "xc7a35ticsg324-1L".to_string(),
                "E3".to_string(),
                10.0,
                "Digilent Arty A7-35T. Maker-oriented board with Arduino/ChipKit shield connectors.".to_string(),
            ),
        );

        boards
    };
}

/// Board definition.
#[derive(Debug, Clone)]
pub struct BoardProfile {
    pub name: String,         // Display name
    pub part: String,         // Full device part identifier
    pub clock_pin: String,    // Package pin of the board oscillator
    pub clock_period_ns: f64, // Oscillator period
    pub description: String,  // User-friendly description
}

impl BoardProfile {
    /// Create a new board definition.
    pub fn new(
        name: String,
        part: String,
        clock_pin: String,
        clock_period_ns: f64,
        description: String,
    ) -> Self {
        BoardProfile {
            name,
            part,
            clock_pin,
            clock_period_ns,
            description,
        }
    }
}

/// Get board by catalog key, case-insensitively.
pub fn get_board(name: &str) -> Option<BoardProfile> {
    let lowercase_name = name.to_lowercase();
    BOARDS.get(&lowercase_name).cloned()
}

/// Sorted catalog keys, for "unknown board" error messages.
pub fn board_names() -> Vec<String> {
    let mut names: Vec<String> = BOARDS.keys().cloned().collect();
    names.sort();
    names
}
