//! Precomputed constants for the Merkle tree.
//!
//! This module contains precomputed empty subtree hashes for every depth of
//! the committed memory tree, allowing sparse representation: any subtree
//! that holds no non-zero word hashes to the constant for its depth without
//! being materialized.
//!
//! - Depth 0: hash of a zero word
//! - Depth d: hash of (empty_subtree[d-1] ‖ empty_subtree[d-1])

use hex_literal::hex;
use tribunal_core::addr::TREE_DEPTH;
use tribunal_core::hash::H256;

/// Empty subtree hashes, indexed by subtree height `0..=TREE_DEPTH`.
///
/// `EMPTY_SUBTREE[TREE_DEPTH]` is the root of a memory that was never
/// written.
pub const EMPTY_SUBTREE: [H256; TREE_DEPTH + 1] = [
    hex!("af5570f5a1810b7af78caf4bc70a660f0df51e42baf91d4de5b2328de0e83dfc"),
    hex!("5672695e79d5c2898c61dffa926bd315e5000a77cf38303c0744fcc5a94f5c02"),
    hex!("fee79cde9d08aa336fc604dda152d80852d9a39277ce15aa423ffc743ffd9b5f"),
    hex!("6866f7c8d6aa19dbbcae733e4dc65c8d5f00e20cd6c6780c7e375aa46bcabc36"),
    hex!("8bf78e83d1824d3fd28dac8526b31590a8217f3bcba5ccd557eb866f8dff2606"),
    hex!("02cadc72bc6051b3c8c02661ca781e137e4716ddd72a50bd08fee00452483bbe"),
    hex!("1a4f0e16cb57b12b4636d89fc8c168ef497e3be62a09d82f66e6d1e0f4f728e0"),
    hex!("937973244167d2ef24f02247ab9b5f1bd8136f1a6c046655da210ad8c0a58a25"),
    hex!("5c27a0c537d74254103d07a049441f85ad2c460e2273267eff224e8cb9ec7e92"),
    hex!("72118c5bf3ab3ab7170e9dca377d26c611fc75364dcbb77b395e6787473a6098"),
    hex!("8e025e88279464b56f1474c631bcd2794264dbb3a1eea3bc5324d4f21a09f1af"),
    hex!("02b1670548b626d76316a7fe533411665b7e3dd8ef86ee80c9f28a26e884a8f2"),
    hex!("62fc186161de002e5e5d5f49ede18f0338364ceb6200fe95009427c99bd2e807"),
    hex!("1337e0a54dedb36048fe7dfe55dde8706b03b7e1bbab4ae46101f1b6e43b4813"),
    hex!("e2962b06c12405cd1ec0f8ee96329e6fcbc8cb6c50026b357fdec7ae7df2acca"),
    hex!("637b00a78c92451b6403601534a1ab397ecfd3ffb04c2b04e3db6d930797971d"),
    hex!("7bf923a5439deac37cc794b561958cc448727998b964f4293229fa1df393364d"),
    hex!("796f93015861b7dd20995657557257ed4aa9ad7667bc5e8a1e9dc83ceda0fc3e"),
    hex!("53c75e7405e21f491e4041acafdd7ea7442062b0c306417dd89213bc5adfa062"),
    hex!("996ec6beefe73152219dc708909800793ff5fe9f5aea43b9aba8daf104ed4370"),
    hex!("366e242f3f98a5d99fea963a120b77996870fac2b5239d063dffa13e39db9273"),
    hex!("56e4f96fcb2db05da0de62e741bd05c9c43ff3260660ffedc8a9f1c109091484"),
    hex!("57a05faad617c758ea50338072a2e8ec5f922a66457f43c3f2c9792be2ce423c"),
    hex!("1b46c0f22cfa6cea6d32ff5f4fd1c2893fb4a0b5f70cea4ce43e5f902db13562"),
    hex!("29e350397c3eab078a2dc6e745a96755c94fb5afcde479045bc9ab98f2f1832f"),
    hex!("18b2cea15e862a642d7011e9457f9747352e336ba6e0af6bdbccec1f21b77808"),
    hex!("37ce6711aad5a52e672d801088b872c6c8ac44eb2e99eca6da673b65058f035e"),
    hex!("1ffc81f021d77b2d48908b23880ec17e4660b5a2c47ccda47cc3dbb2af02ec7d"),
    hex!("ab4d5bdcaa6d6b2adb22cc9e17a098e6f5b9d487a57189227837d8c50440c730"),
    hex!("d9a30ba6b4a685e5461632c4a2a40995b3cb464a75990b7a10115386b99d0c80"),
    hex!("d9712628af4e9439a367cd4ea6d4c6075bf453d4a352d2fa25018a8937e05677"),
    hex!("a0a64e48f965edd6451b95407b408fe817f14688c001e30fcf664bffdd71ffb0"),
    hex!("aa1ef7d514e331fb4f5d49a2b4330f6e3e82de565706c5314c31af0e4538953e"),
    hex!("5e04545c87df0bf746de7b684eb3a3c61d5a0cfb4f57662c4dbe950d29607451"),
    hex!("99fc8e36440d2f2a4892e1b4abbfea3f3492a7856b3967b7b604d305633f9ab0"),
    hex!("141c8d4932c4207b73247dc31ab154f74b16f85653c015b0bc4b3b3eedebd6f3"),
    hex!("6093f881471fa6f265742aa6c63171ca48be643e1142e0158d72fe5f1e5a5ef2"),
    hex!("1d6606ac5c1b65681387b087a2566fda28afc8af3cad10ac2c84a31eab08e069"),
    hex!("2292c6f7fd6252b33a03972acea9169d1cb485d86685cb33dd5c388a322ae4b0"),
    hex!("29804492ba641dab44103ffee09d7740189acbd14007857ac379b6457d93febd"),
    hex!("9e11264129522e981c3f0c6cff1ffd36e74fd93f22a317dc2a56eed585520c27"),
    hex!("a96aff9ed6db8460f91fe4caaeefeae74b9c99a47e9468cd3c7427e26b1e74b8"),
    hex!("aad5f1d991695174199d43a3a9b7515177711b623f298d96b3524b3691865245"),
    hex!("29c699af982c671f40512353ee06794a2a377338c506562e19b171f58b70ab07"),
    hex!("9f3bdf75dd1296ebdd33015090f215aa8704c74097f3535156af7334b00cf608"),
    hex!("61350bc77da5888e531352e4121041c8cae38053d6c89d50b571aa7b41696db3"),
    hex!("8240a733e7ffd5e8df35865110434dcc1eafcf3c2cfb55604faa55cc98d45d6b"),
    hex!("522f7b4c03bb04abb13c6e1986aa9cde73ceed7cac05afd18e289c717bc2fe77"),
    hex!("01374b6180b208c1cbc355ea5d569bd0de59707224f6d0c08ebd10efc81630ee"),
    hex!("5897bfa406246cf726f46588ecbe70fdf39fc55e638b3586038f6a0a4bc5d51e"),
    hex!("b4259abc1e2f5e13e0f86144bcde89570cc69cdc3687102782a3b7e12b8e58ff"),
    hex!("094ae35d17a5d99e40d3445b6d68327a1e2cecfe92430c5b7308c468719114f0"),
    hex!("451466b335281562724df0c14b316b10ce8ed7ef6cd90701b11c804bffc04b75"),
    hex!("9f2acb4cf0bbb1ca1edbc4898742aa7dd1f8372b37fb20d05558e77b39018a1e"),
    hex!("2eade1d0c326eb437af2bc7c96d6a98f268a4f5b6823caaac839147afea0e390"),
    hex!("9bb42cf2a0916c14586cca087fd593ea9489396d5ab0163188a043af7f59d3da"),
    hex!("bc6b38c63276f5c5f75f99ebfe0cb3b6be49e566059dcd7657a6ab5e391f542f"),
    hex!("efddfa449ebeef21e5efdc094d575fa469f9e6342bfbb339f823a1c57d3cb377"),
    hex!("6a54a1692af3822c060c49b8b8abd685eddb9593a0cf067d3941cf0913d23156"),
    hex!("bdf30c2b94c7c914295a0de9050bc5e924f34224eead13bc6fdfc05982eebf29"),
    hex!("fdb35813b4d6e923e4ecf23592a6f688aeee7661b626f327afe652e41750a7ca"),
    hex!("30e9f6eb5127cd88fda5934bbcc2f209096c65b43517fce3bdd58e49d57512f6"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use tribunal_core::hash::{combine, hash_word};

    #[test]
    fn table_matches_recurrence() {
        let mut node = hash_word(0);
        for (height, expected) in EMPTY_SUBTREE.iter().enumerate() {
            assert_eq!(&node, expected, "mismatch at height {}", height);
            node = combine(&node, &node);
        }
    }
}
