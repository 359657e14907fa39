//! Console output macros used for every operator-facing diagnostic line.
#[macro_export]
macro_rules! success_message {
    ($($arg:tt)*) => {{
        println!("{} {}", "[+]".green().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! error_message {
    ($($arg:tt)*) => {{
        eprintln!("{} {}", "[-]".red().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! warning_message {
    ($($arg:tt)*) => {{
        println!("{} {}", "[!]".yellow().bold(), format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! info_message {
    ($($arg:tt)*) => {{
        println!("{} {}", "[*]".cyan().bold(), format!($($arg)*));
    }};
}
