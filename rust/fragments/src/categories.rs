// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC category codes
//!
//! Items carry an integer category code (the type hash used by the geometry
//! parser). The fixed code→name table is exported with every fragment model so
//! consumers can label categories without the parser.

use rustc_hash::FxHashMap;

pub const IFCPROJECT: u32 = 103090709;
pub const IFCSITE: u32 = 4097777520;
pub const IFCBUILDING: u32 = 4031249490;
pub const IFCBUILDINGSTOREY: u32 = 3124254112;
pub const IFCSPACE: u32 = 3856911033;
pub const IFCWALL: u32 = 2391406946;
pub const IFCWALLSTANDARDCASE: u32 = 3512223829;
pub const IFCSLAB: u32 = 1529196076;
pub const IFCROOF: u32 = 2016517767;
pub const IFCBEAM: u32 = 753842376;
pub const IFCCOLUMN: u32 = 843113511;
pub const IFCMEMBER: u32 = 1073191201;
pub const IFCPLATE: u32 = 3171933400;
pub const IFCDOOR: u32 = 395920057;
pub const IFCWINDOW: u32 = 3304561284;
pub const IFCSTAIR: u32 = 331165859;
pub const IFCSTAIRFLIGHT: u32 = 4252922144;
pub const IFCRAMP: u32 = 3024970846;
pub const IFCRAILING: u32 = 2262370178;
pub const IFCCOVERING: u32 = 1973544240;
pub const IFCCURTAINWALL: u32 = 3495092785;
pub const IFCFOOTING: u32 = 900683007;
pub const IFCFURNISHINGELEMENT: u32 = 263784265;
pub const IFCBUILDINGELEMENTPROXY: u32 = 1095909175;
pub const IFCOPENINGELEMENT: u32 = 3588315303;
pub const IFCFLOWTERMINAL: u32 = 2058353004;

/// Every known category, code and name
pub const CATEGORY_NAMES: &[(u32, &str)] = &[
    (IFCPROJECT, "IFCPROJECT"),
    (IFCSITE, "IFCSITE"),
    (IFCBUILDING, "IFCBUILDING"),
    (IFCBUILDINGSTOREY, "IFCBUILDINGSTOREY"),
    (IFCSPACE, "IFCSPACE"),
    (IFCWALL, "IFCWALL"),
    (IFCWALLSTANDARDCASE, "IFCWALLSTANDARDCASE"),
    (IFCSLAB, "IFCSLAB"),
    (IFCROOF, "IFCROOF"),
    (IFCBEAM, "IFCBEAM"),
    (IFCCOLUMN, "IFCCOLUMN"),
    (IFCMEMBER, "IFCMEMBER"),
    (IFCPLATE, "IFCPLATE"),
    (IFCDOOR, "IFCDOOR"),
    (IFCWINDOW, "IFCWINDOW"),
    (IFCSTAIR, "IFCSTAIR"),
    (IFCSTAIRFLIGHT, "IFCSTAIRFLIGHT"),
    (IFCRAMP, "IFCRAMP"),
    (IFCRAILING, "IFCRAILING"),
    (IFCCOVERING, "IFCCOVERING"),
    (IFCCURTAINWALL, "IFCCURTAINWALL"),
    (IFCFOOTING, "IFCFOOTING"),
    (IFCFURNISHINGELEMENT, "IFCFURNISHINGELEMENT"),
    (IFCBUILDINGELEMENTPROXY, "IFCBUILDINGELEMENTPROXY"),
    (IFCOPENINGELEMENT, "IFCOPENINGELEMENT"),
    (IFCFLOWTERMINAL, "IFCFLOWTERMINAL"),
];

/// Name of a category code, if known
pub fn category_name(code: u32) -> Option<&'static str> {
    CATEGORY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// The code→name table as an owned map
pub fn category_table() -> FxHashMap<u32, String> {
    CATEGORY_NAMES
        .iter()
        .map(|(code, name)| (*code, name.to_string()))
        .collect()
}
