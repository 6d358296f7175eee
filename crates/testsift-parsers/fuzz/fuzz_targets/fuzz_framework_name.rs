// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for framework name parsing

#![no_main]

use libfuzzer_sys::fuzz_target;

use testsift_parsers::Framework;

fuzz_target!(|data: &str| {
    if let Ok(framework) = data.parse::<Framework>() {
        // Anything accepted must round-trip through its canonical name
        let canonical: Framework = framework.to_string().parse().expect("canonical name parses");
        assert_eq!(canonical, framework);
    }
});
