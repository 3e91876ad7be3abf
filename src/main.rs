use std::process::ExitCode;

fn main() -> ExitCode {
    match mag_calib::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
