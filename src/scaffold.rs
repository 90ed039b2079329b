//! Project skeleton generation for `bitflow new`.
//!
//! Lays down the directory shape the build pipeline expects: RTL sources
//! under `rtl/`, testbenches under `tb/`, pin constraints under
//! `constraints/`, build outputs under `build/`. A `bitflow.json` profile
//! records the top module and board so later `bitflow build` runs pick
//! them up without repeating flags.

use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::boards::{self, BoardProfile};
use crate::config::loader::{save_profile_to_file, PROFILE_FILE_NAME};
use crate::config::validator::validate_top_module;
use crate::error::BuildError;
use crate::models::BuildProfile;

/// Directories every generated project starts with.
const PROJECT_DIRS: &[&str] = &["rtl", "tb", "constraints", "build"];

/// Inputs for one skeleton, already normalized by the CLI.
#[derive(Debug, Clone)]
pub struct ScaffoldRequest {
    pub project_name: String,
    pub top_module: String,
    pub board: String,
    /// Directory the project root is created under
    pub parent_dir: PathBuf,
}

/// Create a new project skeleton and return its root directory.
///
/// Refuses to touch an existing directory: a skeleton is only ever written
/// from scratch, never merged into prior work.
pub fn create_project_skeleton(request: &ScaffoldRequest) -> Result<PathBuf, BuildError> {
    validate_project_name(&request.project_name)?;
    validate_top_module(&request.top_module)?;
    let board_key = request.board.to_lowercase();
    let board = boards::get_board(&board_key).ok_or_else(|| {
        BuildError::Usage(format!(
            "Unknown board '{}'. Available boards: {}",
            request.board,
            boards::board_names().join(", ")
        ))
    })?;

    let root = request.parent_dir.join(&request.project_name);
    if root.exists() {
        return Err(BuildError::Workspace(format!(
            "Project directory already exists: {}",
            root.display()
        )));
    }

    for dir in PROJECT_DIRS {
        let path = root.join(dir);
        fs::create_dir_all(&path).map_err(|e| {
            BuildError::Workspace(format!("Failed to create {}: {}", path.display(), e))
        })?;
    }

    write_file(
        &root.join("rtl").join(format!("{}.sv", request.top_module)),
        &top_module_template(&request.top_module),
    )?;
    write_file(
        &root.join("tb").join(format!("tb_{}.sv", request.top_module)),
        &testbench_template(&request.top_module),
    )?;
    write_file(
        &root
            .join("constraints")
            .join(format!("{}.xdc", board_key)),
        &constraints_template(&board),
    )?;
    write_file(&root.join(".gitignore"), GITIGNORE)?;

    let profile = BuildProfile {
        top_module: request.top_module.clone(),
        board: Some(board_key.clone()),
        ..BuildProfile::default()
    };
    save_profile_to_file(&profile, &root.join(PROFILE_FILE_NAME)).map_err(|e| {
        BuildError::Workspace(format!("Failed to write project profile: {}", e))
    })?;

    info!(
        "Created project '{}' for board {} (top module '{}')",
        request.project_name, board.name, request.top_module
    );
    Ok(root)
}

fn validate_project_name(name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
        return Err(BuildError::Usage("Project name cannot be empty".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BuildError::Usage(format!(
            "Project name '{}' contains invalid characters. \
             Names must be alphanumeric with underscores or hyphens",
            name
        )));
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<(), BuildError> {
    fs::write(path, content)
        .map_err(|e| BuildError::Workspace(format!("Failed to write {}: {}", path.display(), e)))
}

/// Registered passthrough: switches drive the LEDs one clock later. Enough
/// design to synthesize, place, and exercise the board's I/O.
fn top_module_template(top: &str) -> String {
    format!(
        r#"`timescale 1ns / 1ps

module {top} (
    input  wire        clk,
    input  wire        rst,
    input  wire  [3:0] sw,
    output logic [3:0] led
);

    always_ff @(posedge clk) begin
        if (rst)
            led <= '0;
        else
            led <= sw;
    end

endmodule
"#
    )
}

/// Directed testbench checking a handful of literal vectors through the
/// passthrough register.
fn testbench_template(top: &str) -> String {
    format!(
        r#"`timescale 1ns / 1ps

module tb_{top};

    logic       clk = 1'b0;
    logic       rst = 1'b1;
    logic [3:0] sw = 4'b0000;
    logic [3:0] led;

    always #5 clk = ~clk;

    {top} dut (
        .clk(clk),
        .rst(rst),
        .sw (sw),
        .led(led)
    );

    task check(input logic [3:0] vector);
        sw = vector;
        @(posedge clk);
        #1;
        if (led !== vector)
            $fatal(1, "led = %b, expected %b", led, vector);
    endtask

    initial begin
        repeat (2) @(posedge clk);
        rst = 1'b0;

        check(4'b0001);
        check(4'b1010);
        check(4'b1111);

        $display("tb_{top}: all vectors passed");
        $finish;
    end

endmodule
"#
    )
}

/// Clock pin and period come from the board catalog; everything else is for
/// the user to fill in.
fn constraints_template(board: &BoardProfile) -> String {
    let mut xdc = String::new();
    xdc.push_str(&format!("## {} pin constraints\n\n", board.name));
    xdc.push_str(&format!(
        "set_property PACKAGE_PIN {} [get_ports {{clk}}]\n",
        board.clock_pin
    ));
    xdc.push_str("set_property IOSTANDARD LVCMOS33 [get_ports {clk}]\n");
    xdc.push_str(&format!(
        "create_clock -period {} -name sys_clk [get_ports {{clk}}]\n",
        board.clock_period_ns
    ));
    xdc.push_str(
        "\n## I/O placement - fill in the pins for your wiring\n\
         # set_property PACKAGE_PIN <pin> [get_ports {rst}]\n\
         # set_property PACKAGE_PIN <pin> [get_ports {sw[0]}]\n\
         # set_property PACKAGE_PIN <pin> [get_ports {led[0]}]\n\
         # set_property IOSTANDARD LVCMOS33 [get_ports {sw[*]}]\n\
         # set_property IOSTANDARD LVCMOS33 [get_ports {led[*]}]\n",
    );
    xdc
}

const GITIGNORE: &str = "\
# Build outputs
/build/

# Vivado leftovers
*.jou
*.log
.Xil/

# Editor files
.vscode/
*.swp
*~
";
